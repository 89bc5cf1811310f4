//! Request pacing for providers that throttle bursty clients.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// A fixed-interval gate: successive callers are let through at least `interval` apart.
///
/// Each call to [`FixedIntervalGate::ready`] reserves the next slot before waiting,
/// so concurrent callers queue up behind each other instead of all firing at once.
#[derive(Debug)]
pub struct FixedIntervalGate {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl FixedIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// A gate that never waits.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the caller may send its next request.
    pub async fn ready(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        sleep_until(slot).await;
    }
}
