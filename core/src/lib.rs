//! # Repair Desk Core
//!
//! Domain model and pure business rules of a repair shop front desk.
//!
//! This crate provides the types and decisions that do not depend on any I/O:
//!
//! - **Orders**: the order/device aggregate and its lifecycle ([`machine`])
//! - **Ledger**: payments, methods and payment queries ([`ledger`])
//! - **Closures**: register closure snapshots and reconciliation summaries ([`closure`])
//! - **Registry records**: clients and per-visit device records ([`client`])
//! - **Collaborators**: traits for stores, registry and document rendering ([`providers`])
//! - **Environment**: clock and id generation ([`environment`])
//!
//! The runtime crate wires these together against real collaborators.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use repairdesk_core::environment::{RandomIds, SystemClock};
//! use repairdesk_core::machine::{OrderEnvironment, OrderIntake, OrderPolicy, OrderReducer};
//! use repairdesk_core::order::OrderStatus;
//!
//! let env = OrderEnvironment::new(Arc::new(SystemClock), Arc::new(RandomIds), OrderPolicy::default());
//! let (order, _event) = OrderReducer::open(
//!     OrderIntake {
//!         problem_description: "Does not charge".into(),
//!         device_description: "Lenovo T14".into(),
//!         client_id: None,
//!     },
//!     &env,
//! )?;
//! assert_eq!(order.status, OrderStatus::Pending);
//! # Ok::<(), repairdesk_core::error::RepairError>(())
//! ```

pub mod client;
pub mod closure;
pub mod environment;
pub mod error;
pub mod events;
pub mod ledger;
pub mod machine;
pub mod order;
pub mod providers;
pub mod reducer;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{ErrorKind, RepairError, Result};
pub use events::RepairEvent;
pub use types::{
    ActingTechnician, ClientId, ClosureId, DateRange, DeviceId, Money, OrderId, PaymentId, Period,
    QrToken, ServiceType, TechnicianId, Ticket,
};
