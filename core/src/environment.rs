//! Injected dependencies shared by the reducers and services.
//!
//! Time and identity generation are the only ambient inputs of the core; both
//! are reached through these traits so tests can pin them.

use crate::types::{ClientId, ClosureId, DeviceId, OrderId, PaymentId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use chrono::{DateTime, Utc};
/// use repairdesk_core::environment::Clock;
///
/// struct FixedClock {
///     time: DateTime<Utc>,
/// }
///
/// impl Clock for FixedClock {
///     fn now(&self) -> DateTime<Utc> {
///         self.time
///     }
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of fresh identifiers for new records
pub trait IdGenerator: Send + Sync {
    /// Next raw identifier
    fn next_uuid(&self) -> Uuid;

    /// Identifier for a new order
    fn order_id(&self) -> OrderId {
        OrderId::from_uuid(self.next_uuid())
    }

    /// Identifier for a new device
    fn device_id(&self) -> DeviceId {
        DeviceId::from_uuid(self.next_uuid())
    }

    /// Identifier for a new payment
    fn payment_id(&self) -> PaymentId {
        PaymentId::from_uuid(self.next_uuid())
    }

    /// Identifier for a new closure
    fn closure_id(&self) -> ClosureId {
        ClosureId::from_uuid(self.next_uuid())
    }

    /// Identifier for a new client
    fn client_id(&self) -> ClientId {
        ClientId::from_uuid(self.next_uuid())
    }
}

/// Random v4 identifiers
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}
