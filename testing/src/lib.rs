//! # Repair Desk Testing
//!
//! Testing utilities for the repair desk.
//!
//! This crate provides:
//! - In-memory implementations of every collaborator trait, with fault injection
//! - Deterministic clocks and id generators
//! - Fixtures for technicians, timestamps and intakes
//! - A Given-When-Then harness for reducers
//! - proptest strategies for domain values
//!
//! ## Example
//!
//! ```
//! use repairdesk_testing::mocks::InMemoryPaymentStore;
//! use repairdesk_core::error::StoreError;
//!
//! let payments = InMemoryPaymentStore::new();
//! payments.fail_next_append(StoreError::Unavailable("disk full".into()));
//! assert_eq!(payments.payment_count(), 0);
//! ```

pub mod fixtures;
pub mod mocks;

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use repairdesk_core::ledger::PaymentMethod;

    /// Raw scans: mixed case, padding, tabs and newlines around real content
    pub fn raw_token() -> impl Strategy<Value = String> {
        "[ \\t\\n]{0,3}[a-zA-Z0-9][a-zA-Z0-9 _-]{0,20}[ \\t\\n]{0,3}"
    }

    /// Positive amounts up to S/ 5,000.00, in cents
    pub fn positive_cents() -> impl Strategy<Value = i64> {
        1_i64..=500_000
    }

    /// Any method a new payment may use
    pub fn accepted_method() -> impl Strategy<Value = PaymentMethod> {
        proptest::sample::select(PaymentMethod::ACCEPTED.to_vec())
    }
}

/// Installs a `tracing` subscriber writing to the test output.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, SequentialIds, test_clock};
pub use reducer_test::ReducerTest;
