mod completion;

pub use completion::ProfileCompletion;
