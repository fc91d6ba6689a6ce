//! Pacing requests to the compression service.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

pub type ThrottleHandle = Arc<dyn Throttle + Send + Sync>;

/// Waited on before every request to the compression service.
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn wait(&self);
}

/// Unconditional fixed delay, regardless of how long ago the last request was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        tracing::debug!(delay = ?self.delay, "Throttling compression request");
        tokio::time::sleep(self.delay).await;
    }
}
