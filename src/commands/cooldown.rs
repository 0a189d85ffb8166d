//! Per-user-per-command cooldown gate.
//!
//! Only the time of the last *admitted* call matters. A rejected call does
//! not move the window, so a user who keeps retrying is admitted as soon as
//! the original window has passed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { remaining: Duration },
}

impl Admission {
    /// Whether the call was admitted.
    #[must_use]
    pub const fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Tracks the last admitted invocation per `(user, command)`.
#[derive(Debug, Default)]
pub struct CooldownLedger {
    records: Mutex<HashMap<(i64, String), Instant>>,
}

impl CooldownLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks and, on admission, records the call.
    ///
    /// The lookup and the update happen under one lock.
    pub async fn check(
        &self,
        user_id: i64,
        command: &str,
        cooldown: Duration,
        now: Instant,
    ) -> Admission {
        let mut records = self.records.lock().await;
        let key = (user_id, command.to_owned());

        if let Some(&last) = records.get(&key) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cooldown {
                let remaining = cooldown - elapsed;
                debug!(
                    "Cooldown: user {} must wait {:?} for '{}'",
                    user_id, remaining, command
                );
                return Admission::Rejected { remaining };
            }
        }

        records.insert(key, now);
        Admission::Admitted
    }

    /// Returns `true` if the call is admitted.
    pub async fn admit(
        &self,
        user_id: i64,
        command: &str,
        cooldown: Duration,
        now: Instant,
    ) -> bool {
        self.check(user_id, command, cooldown, now)
            .await
            .is_admitted()
    }

    /// Time of the last admitted call for a pair.
    pub async fn last_seen(&self, user_id: i64, command: &str) -> Option<Instant> {
        self.records
            .lock()
            .await
            .get(&(user_id, command.to_owned()))
            .copied()
    }

    /// Evicts records older than `max_age`, returning how many were removed.
    pub async fn prune(&self, now: Instant, max_age: Duration) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, last| now.saturating_duration_since(*last) < max_age);
        before - records.len()
    }

    /// Number of tracked pairs.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether no pairs are tracked.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

/// A ledger swept by the periodic pruner, with the age its records expire at.
#[derive(Debug, Clone)]
pub struct PrunedLedger {
    pub ledger: Arc<CooldownLedger>,
    pub max_age: Duration,
}

/// Prunes every ledger against its own window, returning the total removed.
pub async fn prune_ledgers(ledgers: &[PrunedLedger], now: Instant) -> usize {
    let mut removed = 0;
    for entry in ledgers {
        removed += entry.ledger.prune(now, entry.max_age).await;
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_first_use_is_admitted() {
        let ledger = CooldownLedger::new();
        let t0 = Instant::now();

        assert!(ledger.admit(42, "ping", WINDOW, t0).await);
        assert_eq!(ledger.last_seen(42, "ping").await, Some(t0));
    }

    #[tokio::test]
    async fn test_call_inside_window_is_rejected() {
        let ledger = CooldownLedger::new();
        let t0 = Instant::now();

        assert!(ledger.admit(42, "ping", WINDOW, t0).await);
        let admission = ledger
            .check(42, "ping", WINDOW, t0 + Duration::from_secs(2))
            .await;
        assert_eq!(
            admission,
            Admission::Rejected {
                remaining: Duration::from_secs(3)
            }
        );
    }

    #[tokio::test]
    async fn test_rejection_does_not_reset_window() {
        let ledger = CooldownLedger::new();
        let t0 = Instant::now();

        assert!(ledger.admit(42, "ping", WINDOW, t0).await);
        assert!(!ledger.admit(42, "ping", WINDOW, t0 + Duration::from_secs(4)).await);
        assert_eq!(ledger.last_seen(42, "ping").await, Some(t0));

        // Admitted once the original window has passed, not 5s after the rejection.
        assert!(ledger.admit(42, "ping", WINDOW, t0 + Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_admission_after_window_updates_record() {
        let ledger = CooldownLedger::new();
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(7);

        assert!(ledger.admit(42, "ping", WINDOW, t0).await);
        assert!(ledger.admit(42, "ping", WINDOW, later).await);
        assert_eq!(ledger.last_seen(42, "ping").await, Some(later));
    }

    #[tokio::test]
    async fn test_keys_are_per_user_and_command() {
        let ledger = CooldownLedger::new();
        let t0 = Instant::now();

        assert!(ledger.admit(1, "ping", WINDOW, t0).await);
        assert!(ledger.admit(2, "ping", WINDOW, t0).await);
        assert!(ledger.admit(1, "info", WINDOW, t0).await);
        assert_eq!(ledger.len().await, 3);
    }

    #[tokio::test]
    async fn test_prune_removes_stale_records() {
        let ledger = CooldownLedger::new();
        let t0 = Instant::now();

        ledger.admit(1, "ping", WINDOW, t0).await;
        ledger.admit(2, "ping", WINDOW, t0 + Duration::from_secs(50)).await;

        let removed = ledger
            .prune(t0 + Duration::from_secs(60), Duration::from_secs(30))
            .await;
        assert_eq!(removed, 1);
        assert!(ledger.last_seen(1, "ping").await.is_none());
        assert!(ledger.last_seen(2, "ping").await.is_some());
    }

    #[tokio::test]
    async fn test_prune_ledgers_uses_each_window() {
        let private = Arc::new(CooldownLedger::new());
        let public = Arc::new(CooldownLedger::new());
        let t0 = Instant::now();

        private.admit(42, "ping", WINDOW, t0).await;
        for user in 1..=3 {
            public.admit(user, "help", Duration::from_secs(30), t0).await;
        }

        let ledgers = [
            PrunedLedger {
                ledger: Arc::clone(&private),
                max_age: WINDOW,
            },
            PrunedLedger {
                ledger: Arc::clone(&public),
                max_age: Duration::from_secs(30),
            },
        ];

        assert_eq!(prune_ledgers(&ledgers, t0 + Duration::from_secs(10)).await, 1);
        assert!(private.is_empty().await);
        assert_eq!(public.len().await, 3);

        assert_eq!(prune_ledgers(&ledgers, t0 + Duration::from_secs(31)).await, 3);
        assert!(public.is_empty().await);
    }
}
