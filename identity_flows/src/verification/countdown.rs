use std::sync::{Arc, LazyLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Seconds a user waits before another code can be requested.
pub static RESEND_COOLDOWN_SECS: LazyLock<u32> = LazyLock::new(|| {
    std::env::var("IDENTITY_RESEND_COOLDOWN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
});

/// Resend cooldown counter, one tick per second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResendCountdown {
    remaining: u32,
    cooldown: u32,
}

impl ResendCountdown {
    pub fn new(cooldown: u32) -> Self {
        Self {
            remaining: 0,
            cooldown,
        }
    }

    /// Restarts from the full cooldown.
    pub fn start(&mut self) {
        self.remaining = self.cooldown;
    }

    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.remaining > 0
    }

    /// Resend is allowed only once the countdown reached zero and nothing is in flight.
    pub fn can_resend(&self, in_flight: bool) -> bool {
        !self.is_running() && !in_flight
    }
}

impl Default for ResendCountdown {
    fn default() -> Self {
        Self::new(*RESEND_COOLDOWN_SECS)
    }
}

/// A [`ResendCountdown`] driven by a background ticker task.
///
/// The ticker is aborted on `stop` and on drop so an unmounted flow leaves no timer behind.
#[derive(Debug)]
pub(crate) struct ResendTimer {
    countdown: Arc<Mutex<ResendCountdown>>,
    ticker: Option<JoinHandle<()>>,
}

impl ResendTimer {
    pub(crate) fn new(cooldown: u32) -> Self {
        Self {
            countdown: Arc::new(Mutex::new(ResendCountdown::new(cooldown))),
            ticker: None,
        }
    }

    pub(crate) async fn restart(&mut self) {
        self.stop();
        self.countdown.lock().await.start();
        let countdown = self.countdown.clone();
        self.ticker = Some(tokio::spawn(run_ticker(countdown)));
    }

    pub(crate) fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    pub(crate) async fn remaining(&self) -> u32 {
        self.countdown.lock().await.remaining()
    }

    pub(crate) async fn can_resend(&self, in_flight: bool) -> bool {
        self.countdown.lock().await.can_resend(in_flight)
    }
}

impl Default for ResendTimer {
    fn default() -> Self {
        Self::new(*RESEND_COOLDOWN_SECS)
    }
}

impl Drop for ResendTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_ticker(countdown: Arc<Mutex<ResendCountdown>>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        if countdown.lock().await.tick() == 0 {
            break;
        }
    }
}
