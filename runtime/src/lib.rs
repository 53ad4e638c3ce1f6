//! # Repair Desk Runtime
//!
//! Services that run the repair desk core against its collaborators.
//!
//! ## Core Components
//!
//! - **`OrderService`**: loads an order, runs the state machine, persists and publishes
//! - **`PaymentLedger`**: appends payments and streams an order's history
//! - **`CashRegister`**: previews uncleared totals and closes the register
//! - **`QrResolver`**: turns a scanned tag into the device's service history
//! - **`TechnicianStats`**: diagnosed counts and revenue per technician
//! - **`FrontDesk`**: all of the above wired to one set of backends
//!
//! ## Example
//!
//! ```ignore
//! use repairdesk_runtime::{Backends, DeskConfig, FrontDesk};
//!
//! let desk = FrontDesk::new(DeskConfig::from_env(), backends, clock, ids);
//! let order = desk.orders().open_order(intake).await?;
//! desk.orders().link_device(order.id, " QR-0042 ", ServiceType::Workshop, &tech).await?;
//! let checkout = desk.checkout(order.id, Money::parse("80")?, PaymentMethod::Cash, &tech).await?;
//! ```

/// Configuration loaded from the environment
pub mod config;

/// The front desk facade
pub mod desk;

/// Payment ledger
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Order lifecycle service
pub mod orders;

/// State-change event broadcast
pub mod publisher;

/// Cash closure engine
pub mod register;

/// QR identity resolution
pub mod resolver;

/// Technician aggregation
pub mod stats;

pub use config::DeskConfig;
pub use desk::{Backends, Checkout, FrontDesk};
pub use ledger::{PaymentHistory, PaymentLedger};
pub use metrics::MetricsRecorder;
pub use orders::{Diagnosis, OrderService};
pub use publisher::EventPublisher;
pub use register::{CashRegister, ClosureDetail};
pub use resolver::{QrResolver, Resolution, ServiceRecord};
pub use stats::{TechnicianReport, TechnicianStat, TechnicianStats};
