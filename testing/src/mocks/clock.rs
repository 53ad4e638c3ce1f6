use chrono::{DateTime, Duration, Utc};
use repairdesk_core::environment::{Clock, IdGenerator};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use repairdesk_testing::mocks::FixedClock;
/// use repairdesk_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Create a default fixed clock for tests (2025-03-10 15:00:00 UTC)
///
/// # Panics
///
/// This function will panic if the hardcoded timestamp fails to parse,
/// which should never happen in practice.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-03-10T15:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// Clock a test moves forward by hand. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock starting at `start`
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        if let Ok(mut time) = self.time.lock() {
            *time += by;
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut time) = self.time.lock() {
            *time = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.time.lock().map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
    }
}

/// Predictable ids: `00000000-0000-0000-0000-000000000001`, `..02`, and so on
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    /// Start counting from 1
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_uuid(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(u128::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(test_clock().now());
        let other = clock.clone();
        clock.advance(Duration::minutes(5));
        assert_eq!(other.now() - test_clock().now(), Duration::minutes(5));
    }

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_uuid(), Uuid::from_u128(1));
        assert_eq!(ids.order_id().as_uuid(), &Uuid::from_u128(2));
    }
}
