use std::collections::HashSet;

use super::types::VerificationStrategy;

/// At-most-once guard for automatic `prepare-verification` dispatch.
///
/// Keyed by attempt identifier and strategy, so replaying the same attempt never
/// sends a second code, while a later step of the same attempt (email, then phone)
/// still gets its own dispatch.
#[derive(Debug, Default, Clone)]
pub struct VerificationLatch {
    fired: HashSet<(String, VerificationStrategy)>,
}

impl VerificationLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the latch and returns `true` only on the first call for this key.
    pub fn try_fire(&mut self, attempt_id: &str, strategy: VerificationStrategy) -> bool {
        let fired = self.fired.insert((attempt_id.to_string(), strategy));
        if !fired {
            tracing::debug!(
                "Verification {} already prepared for attempt {}",
                strategy,
                attempt_id
            );
        }
        fired
    }
}
