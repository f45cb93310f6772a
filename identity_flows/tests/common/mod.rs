pub mod fixtures;
pub mod mock_backend;

pub use fixtures::*;
pub use mock_backend::{MockBackend, VALID_CODE, VALID_PASSWORD};
