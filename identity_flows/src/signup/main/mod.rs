mod fields;
mod machine;

pub use fields::{validate_missing_fields, validate_required_fields};
pub use machine::SignupFlow;

pub(crate) use fields::{collectable_fields, submit_missing_fields};
