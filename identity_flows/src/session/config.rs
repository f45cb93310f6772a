use std::sync::LazyLock;
use std::time::Duration;

pub(crate) const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(5);

/// Interval of the background session refresh.
pub static SESSION_REFRESH_INTERVAL: LazyLock<Duration> = LazyLock::new(|| {
    refresh_interval_from(std::env::var("IDENTITY_SESSION_REFRESH_INTERVAL_SECS").ok())
});

/// Window in which a completed fetch satisfies further revalidation requests.
pub static SESSION_DEDUPE_WINDOW: LazyLock<Duration> = LazyLock::new(|| {
    dedupe_window_from(std::env::var("IDENTITY_SESSION_DEDUPE_WINDOW_SECS").ok())
});

/// Anything but a positive number of seconds falls back to the default.
fn refresh_interval_from(value: Option<String>) -> Duration {
    match value.map(|s| s.parse::<u64>()) {
        None => DEFAULT_REFRESH_INTERVAL,
        Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
        Some(_) => {
            tracing::warn!(
                "Invalid IDENTITY_SESSION_REFRESH_INTERVAL_SECS, using {}s",
                DEFAULT_REFRESH_INTERVAL.as_secs()
            );
            DEFAULT_REFRESH_INTERVAL
        }
    }
}

/// Zero is allowed and disables deduplication.
fn dedupe_window_from(value: Option<String>) -> Duration {
    value
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_DEDUPE_WINDOW)
}

/// Revalidation policy of a [`SessionCache`](super::SessionCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCacheOptions {
    pub refresh_interval: Duration,
    pub dedupe_window: Duration,
    /// Off by default: a focus change must not swap the session mid-interaction.
    pub revalidate_on_focus: bool,
    pub revalidate_on_reconnect: bool,
}

impl Default for SessionCacheOptions {
    fn default() -> Self {
        Self {
            refresh_interval: *SESSION_REFRESH_INTERVAL,
            dedupe_window: *SESSION_DEDUPE_WINDOW,
            revalidate_on_focus: false,
            revalidate_on_reconnect: false,
        }
    }
}
