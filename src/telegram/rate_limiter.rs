//! Throttle for outgoing Telegram API calls.
//!
//! Keeps a minimum interval between calls and pushes the next slot back
//! when Telegram answers with `FLOOD_WAIT`.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Hands out send slots at least `min_interval` apart.
#[derive(Debug)]
pub struct SendThrottle {
    /// Minimum duration between two calls.
    min_interval: Duration,

    /// Earliest instant the next call may start.
    next_slot: Mutex<Option<Instant>>,
}

impl SendThrottle {
    /// Creates a throttle with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Creates a throttle from milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Minimum interval between calls.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Reserves the next slot for a call made at `now`.
    ///
    /// Returns how long the caller has to wait before the slot starts.
    pub async fn reserve(&self, now: Instant) -> Duration {
        let mut next = self.next_slot.lock().await;
        let slot = next.map_or(now, |n| n.max(now));
        *next = Some(slot + self.min_interval);
        slot - now
    }

    /// Waits for the next slot.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn acquire(&self) -> Duration {
        let wait = self.reserve(Instant::now()).await;
        if !wait.is_zero() {
            debug!("Send throttle: waiting {:?} before next call", wait);
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Pushes the next slot back after a flood wait answer.
    pub async fn penalize(&self, wait_seconds: u32, now: Instant) {
        warn!(
            "Received flood wait from Telegram: {} seconds",
            wait_seconds
        );
        let until = now + Duration::from_secs(u64::from(wait_seconds));
        let mut next = self.next_slot.lock().await;
        *next = Some(next.map_or(until, |n| n.max(until)));
    }

    /// Time remaining until a call made at `now` could start.
    pub async fn time_until_allowed(&self, now: Instant) -> Duration {
        self.next_slot
            .lock()
            .await
            .map_or(Duration::ZERO, |n| n.saturating_duration_since(now))
    }

    /// Resets the throttle, allowing immediate calls.
    pub async fn reset(&self) {
        *self.next_slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_is_immediate() {
        let throttle = SendThrottle::from_millis(500);
        assert_eq!(throttle.reserve(Instant::now()).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_slots_are_spaced() {
        let throttle = SendThrottle::from_millis(500);
        let t0 = Instant::now();

        assert_eq!(throttle.reserve(t0).await, Duration::ZERO);
        assert_eq!(throttle.reserve(t0).await, Duration::from_millis(500));
        assert_eq!(throttle.reserve(t0).await, Duration::from_millis(1000));

        // After the queue drains calls are immediate again.
        let later = t0 + Duration::from_secs(5);
        assert_eq!(throttle.reserve(later).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_flood_wait_pushes_slot_back() {
        let throttle = SendThrottle::from_millis(100);
        let t0 = Instant::now();

        throttle.penalize(3, t0).await;
        assert_eq!(throttle.time_until_allowed(t0).await, Duration::from_secs(3));
        assert_eq!(throttle.reserve(t0).await, Duration::from_secs(3));

        // A shorter penalty never shortens an existing one.
        throttle.penalize(1, t0).await;
        assert_eq!(
            throttle.time_until_allowed(t0).await,
            Duration::from_millis(3100)
        );
    }

    #[tokio::test]
    async fn test_acquire_waits() {
        let throttle = SendThrottle::new(Duration::from_millis(50));
        assert_eq!(throttle.acquire().await, Duration::ZERO);
        let waited = throttle.acquire().await;
        assert!(waited > Duration::ZERO);
        assert!(waited <= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_reset() {
        let throttle = SendThrottle::new(Duration::from_secs(60));
        let now = Instant::now();

        throttle.reserve(now).await;
        assert!(throttle.time_until_allowed(now).await > Duration::ZERO);

        throttle.reset().await;
        assert_eq!(throttle.time_until_allowed(now).await, Duration::ZERO);
    }
}
