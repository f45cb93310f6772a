mod config;
mod errors;
mod reconcile;
mod types;

pub use config::{DEV_SESSION_COOKIE_NAME, DEV_SESSION_STORAGE_KEY};
pub use errors::StorageError;
pub use reconcile::{DevTokenReconciler, reconcile_tokens};
pub use types::{DevSessionToken, KeyValueStore, MemoryStore};
