use std::sync::Arc;

use crate::utils::{now_ms, parse_epoch_ms};

use super::config::{DEV_SESSION_COOKIE_NAME, DEV_SESSION_STORAGE_KEY, updated_at_key};
use super::errors::StorageError;
use super::types::{DevSessionToken, KeyValueStore};

/// Decides which copy of the development session token is authoritative.
///
/// Rules, applied in order:
/// 1. Only one location holds a token: it wins.
/// 2. Same value in both: keep it, preferring the stored timestamp.
/// 3. Cookie without a timestamp: it was just issued by the server and wins.
/// 4. Both timestamped: the strictly newer one wins; a tie keeps the stored value.
/// 5. Stored copy without a timestamp loses to a timestamped cookie.
///
/// The returned token always carries a timestamp (`now_ms` when neither side had one).
pub fn reconcile_tokens(
    cookie: Option<&DevSessionToken>,
    stored: Option<&DevSessionToken>,
    now_ms: i64,
) -> Option<DevSessionToken> {
    let winner = match (cookie, stored) {
        (None, None) => return None,
        (Some(cookie), None) => cookie.clone(),
        (None, Some(stored)) => stored.clone(),
        (Some(cookie), Some(stored)) if cookie.value == stored.value => DevSessionToken {
            value: stored.value.clone(),
            updated_at: stored.updated_at.or(cookie.updated_at),
        },
        (Some(cookie), Some(stored)) => match (cookie.updated_at, stored.updated_at) {
            (None, _) => DevSessionToken::new(cookie.value.clone(), Some(now_ms)),
            (Some(_), None) => cookie.clone(),
            (Some(cookie_ts), Some(stored_ts)) if cookie_ts > stored_ts => cookie.clone(),
            (Some(_), Some(_)) => stored.clone(),
        },
    };

    Some(DevSessionToken {
        updated_at: Some(winner.updated_at.unwrap_or(now_ms)),
        ..winner
    })
}

/// Keeps the development session token identical in the cookie jar and the
/// persistent store. Write arbitration only; the storage media belong to the host.
#[derive(Clone)]
pub struct DevTokenReconciler {
    cookies: Arc<dyn KeyValueStore>,
    storage: Arc<dyn KeyValueStore>,
    cookie_name: String,
    storage_key: String,
}

impl DevTokenReconciler {
    pub fn new(cookies: Arc<dyn KeyValueStore>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_keys(
            cookies,
            storage,
            DEV_SESSION_COOKIE_NAME.as_str(),
            DEV_SESSION_STORAGE_KEY.as_str(),
        )
    }

    pub fn with_keys(
        cookies: Arc<dyn KeyValueStore>,
        storage: Arc<dyn KeyValueStore>,
        cookie_name: &str,
        storage_key: &str,
    ) -> Self {
        Self {
            cookies,
            storage,
            cookie_name: cookie_name.to_string(),
            storage_key: storage_key.to_string(),
        }
    }

    pub fn reconcile(&self) -> Result<Option<DevSessionToken>, StorageError> {
        self.reconcile_at(now_ms())
    }

    /// Reads both locations, picks the winner, and writes it back wherever it differs.
    pub fn reconcile_at(&self, now_ms: i64) -> Result<Option<DevSessionToken>, StorageError> {
        let cookie = read_token(self.cookies.as_ref(), &self.cookie_name)?;
        let stored = read_token(self.storage.as_ref(), &self.storage_key)?;

        let Some(winner) = reconcile_tokens(cookie.as_ref(), stored.as_ref(), now_ms) else {
            return Ok(None);
        };

        if cookie.as_ref() != Some(&winner) {
            tracing::debug!("Updating dev session cookie from reconciliation");
            write_token(self.cookies.as_ref(), &self.cookie_name, &winner)?;
        }
        if stored.as_ref() != Some(&winner) {
            tracing::debug!("Updating stored dev session from reconciliation");
            write_token(self.storage.as_ref(), &self.storage_key, &winner)?;
        }

        Ok(Some(winner))
    }

    /// Records a token issued to this client in both locations.
    pub fn write(&self, value: &str) -> Result<DevSessionToken, StorageError> {
        self.write_at(&DevSessionToken::new(value, None), now_ms())
    }

    pub fn write_at(
        &self,
        token: &DevSessionToken,
        now_ms: i64,
    ) -> Result<DevSessionToken, StorageError> {
        let token = DevSessionToken::new(token.value.clone(), Some(token.updated_at.unwrap_or(now_ms)));
        write_token(self.cookies.as_ref(), &self.cookie_name, &token)?;
        write_token(self.storage.as_ref(), &self.storage_key, &token)?;
        Ok(token)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        for (store, key) in [
            (self.cookies.as_ref(), &self.cookie_name),
            (self.storage.as_ref(), &self.storage_key),
        ] {
            store.remove(key)?;
            store.remove(&updated_at_key(key))?;
        }
        tracing::debug!("Cleared dev session token");
        Ok(())
    }
}

fn read_token(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<DevSessionToken>, StorageError> {
    let Some(value) = store.get(key)?.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let updated_at = match store.get(&updated_at_key(key))? {
        Some(raw) => match parse_epoch_ms(&raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                tracing::warn!("Ignoring malformed dev session timestamp under {}: {}", key, e);
                None
            }
        },
        None => None,
    };
    Ok(Some(DevSessionToken { value, updated_at }))
}

fn write_token(
    store: &dyn KeyValueStore,
    key: &str,
    token: &DevSessionToken,
) -> Result<(), StorageError> {
    store.set(key, &token.value)?;
    match token.updated_at {
        Some(ts) => store.set(&updated_at_key(key), &ts.to_string()),
        None => store.remove(&updated_at_key(key)),
    }
}
