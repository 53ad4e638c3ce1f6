//! Ready-made values for tests.

#![allow(clippy::expect_used)] // Fixtures are built from constants known to be valid

use crate::mocks::{SequentialIds, test_clock};
use chrono::{DateTime, TimeZone, Utc};
use repairdesk_core::environment::Clock;
use repairdesk_core::ledger::{Payment, PaymentMethod};
use repairdesk_core::machine::{OrderEnvironment, OrderIntake, OrderPolicy};
use repairdesk_core::types::{ActingTechnician, Money, OrderId, PaymentId};
use std::sync::Arc;

/// Technician `id` with an upper-cased display name
///
/// # Panics
///
/// Panics if `id` is blank.
#[must_use]
pub fn technician(id: &str) -> ActingTechnician {
    ActingTechnician::new(id, id.to_uppercase()).expect("fixture technician id must not be blank")
}

/// A time in March 2025, UTC
///
/// # Panics
///
/// Panics if the day or hour is out of range.
#[must_use]
pub fn march(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0)
        .single()
        .expect("fixture date must be valid")
}

/// Walk-in intake with no registered client
#[must_use]
pub fn intake(problem: &str, device: &str) -> OrderIntake {
    OrderIntake {
        problem_description: problem.to_string(),
        device_description: device.to_string(),
        client_id: None,
    }
}

/// Order environment with the fixed test clock and sequential ids
#[must_use]
pub fn order_env() -> OrderEnvironment {
    order_env_with(Arc::new(test_clock()), OrderPolicy::default())
}

/// Order environment with a custom clock and policy
#[must_use]
pub fn order_env_with(clock: Arc<dyn Clock>, policy: OrderPolicy) -> OrderEnvironment {
    OrderEnvironment::new(clock, Arc::new(SequentialIds::new()), policy)
}

/// Uncleared payment taken at the test clock's time by `tech-1`
#[must_use]
pub fn payment(order_id: OrderId, amount: Money, method: PaymentMethod) -> Payment {
    Payment {
        id: PaymentId::new(),
        order_id,
        amount,
        method,
        paid_at: test_clock().now(),
        recorded_by: technician("tech-1").id,
        cleared_by: None,
    }
}
