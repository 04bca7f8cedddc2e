//! Minimum inter-call spacing across a whole batch.
//!
//! All outbound calls go to a single remote API, so one shared clock is
//! enough: every call reserves the next available slot and sleeps until
//! it. Safe under concurrent access — slots are reserved under the lock,
//! the sleep happens outside it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum delay between consecutive outbound calls.
#[derive(Clone)]
pub struct Pacer {
    min_spacing: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl Pacer {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// 500ms between calls — stays well under typical per-minute ceilings.
    pub fn default_spacing() -> Self {
        Self::new(Duration::from_millis(500))
    }

    /// Wait until the next call slot is available, reserving it.
    ///
    /// The first call goes through immediately.
    pub async fn pace(&self) {
        let target = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let target = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(target + self.min_spacing);
            target
        };

        let now = Instant::now();
        if target > now {
            tracing::debug!(
                sleep_ms = %(target - now).as_millis(),
                "Pacing outbound call"
            );
            tokio::time::sleep_until(target).await;
        }
    }
}
