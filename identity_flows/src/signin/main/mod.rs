mod machine;
mod magic_link;
mod strategy;

pub use machine::SigninFlow;
