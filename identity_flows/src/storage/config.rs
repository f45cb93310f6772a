use std::sync::LazyLock;

/// Cookie carrying the development session token.
pub static DEV_SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("IDENTITY_DEV_SESSION_COOKIE_NAME")
        .ok()
        .unwrap_or("__dev_session__".to_string())
});

/// Persistent-store key mirroring [`DEV_SESSION_COOKIE_NAME`].
pub static DEV_SESSION_STORAGE_KEY: LazyLock<String> = LazyLock::new(|| {
    std::env::var("IDENTITY_DEV_SESSION_STORAGE_KEY")
        .ok()
        .unwrap_or("__dev_session__".to_string())
});

/// Suffix of the companion entry holding the token's `updated_at`.
pub(super) const UPDATED_AT_SUFFIX: &str = "_updated_at";

pub(super) fn updated_at_key(key: &str) -> String {
    format!("{key}{UPDATED_AT_SUFFIX}")
}
