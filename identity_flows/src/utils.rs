use chrono::Utc;
use thiserror::Error;
use url::Url;

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn parse_epoch_ms(raw: &str) -> Result<i64, UtilError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| UtilError::Format(format!("Invalid epoch milliseconds: {raw}")))
}

/// Parses a base URL and makes sure relative joins keep its full path.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url, UtilError> {
    let mut url = Url::parse(raw).map_err(|e| UtilError::Url(format!("{raw}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UtilError {
    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Invalid url: {0}")]
    Url(String),
}
