//! Process-wide backpressure for accrual lookups.
//!
//! When the accrual service answers with `429 Too Many Requests`, the worker that saw it records the cool-down here.
//! The cool-down is stored as a deadline, so every worker and the producer resume at the same instant, however late
//! they notice the pause.
use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};

use log::*;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Upper bound on a single recorded cool-down.
pub const MAX_PAUSE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
pub struct RateLimitCoordinator {
    resume_at: RwLock<Option<Instant>>,
}

impl RateLimitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The time left until lookups may resume, or `None` if there is no pending cool-down.
    pub fn should_pause(&self) -> Option<Duration> {
        let now = Instant::now();
        let resume_at = *self.resume_at.read().unwrap_or_else(PoisonError::into_inner);
        match resume_at {
            Some(deadline) if deadline > now => Some(deadline - now),
            Some(_) => {
                self.clear_expired(now);
                None
            },
            None => None,
        }
    }

    /// Records a cool-down of `pause`, starting now. Any pending cool-down is replaced, even a longer one. Pauses longer
    /// than [`MAX_PAUSE`] are clamped.
    pub fn record_pause(&self, pause: Duration) {
        let pause = pause.min(MAX_PAUSE);
        let now = Instant::now();
        let deadline = now.checked_add(pause).unwrap_or(now);
        *self.resume_at.write().unwrap_or_else(PoisonError::into_inner) = Some(deadline);
        warn!("⏳️ Accrual lookups paused for {}s", pause.as_secs());
    }

    /// Sleeps until any pending cool-down has passed. A pause recorded while sleeping extends the wait.
    ///
    /// Returns `false` if `cancel` fired first.
    pub async fn wait_if_paused(&self, cancel: &CancellationToken) -> bool {
        while let Some(remaining) = self.should_pause() {
            debug!("⏳️ Waiting {}ms for the rate limit to lift", remaining.as_millis());
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(remaining) => {},
            }
        }
        !cancel.is_cancelled()
    }

    fn clear_expired(&self, now: Instant) {
        let mut resume_at = self.resume_at.write().unwrap_or_else(PoisonError::into_inner);
        // Another pause may have been recorded since the read
        if matches!(*resume_at, Some(deadline) if deadline <= now) {
            *resume_at = None;
            debug!("⏳️ Rate limit lifted");
        }
    }
}
