//! State-change events.
//!
//! Every successful transition, payment and closure produces exactly one
//! [`RepairEvent`]. The order reducer applies its events to the order; the
//! runtime broadcasts all of them to subscribers.

use crate::closure::CashClosure;
use crate::ledger::Payment;
use crate::order::OrderStatus;
use crate::types::{
    ClientId, DeviceId, Money, OrderId, QrToken, ServiceType, TechnicianId, Ticket,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something that happened at the repair desk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepairEvent {
    /// A new order was taken in
    OrderOpened {
        /// New order
        order_id: OrderId,
        /// Its ticket
        ticket: Ticket,
        /// Its device
        device_id: DeviceId,
        /// Owner, when known at intake
        client_id: Option<ClientId>,
        /// Reported problem
        problem_description: String,
        /// Device description
        device_description: String,
        /// Intake time
        opened_at: DateTime<Utc>,
    },

    /// A QR token was bound to the order's device
    DeviceLinked {
        /// Owning order
        order_id: OrderId,
        /// Linked device
        device_id: DeviceId,
        /// Normalized token
        token: QrToken,
        /// Service type chosen at linking
        service_type: ServiceType,
        /// Receiving technician
        technician: TechnicianId,
        /// Token the device carried before, if any
        replaced: Option<QrToken>,
        /// Link time
        linked_at: DateTime<Utc>,
    },

    /// The device was diagnosed
    DiagnosisRecorded {
        /// Owning order
        order_id: OrderId,
        /// Diagnosis text, trimmed
        diagnosis: String,
        /// Diagnosis photo
        image_ref: Option<String>,
        /// Proforma cost, zero when none was quoted
        declared_cost: Money,
        /// Diagnosing technician
        technician: TechnicianId,
        /// Status left through an override
        reopened_from: Option<OrderStatus>,
        /// Diagnosis time
        diagnosed_at: DateTime<Utc>,
    },

    /// The device was handed back
    OrderDelivered {
        /// Owning order
        order_id: OrderId,
        /// Final cost, if set on delivery
        final_cost: Option<Money>,
        /// Delivering technician
        technician: TechnicianId,
        /// Status left through an override
        reopened_from: Option<OrderStatus>,
        /// Delivery time
        delivered_at: DateTime<Utc>,
    },

    /// The client never came back
    OrderAbandoned {
        /// Owning order
        order_id: OrderId,
        /// Status left through an override
        reopened_from: Option<OrderStatus>,
        /// Abandonment time as given by the operator
        abandoned_at: DateTime<Utc>,
    },

    /// Walk-in sale completed without a diagnosis step
    QuickSaleCompleted {
        /// Owning order
        order_id: OrderId,
        /// Technician who made the sale
        technician: TechnicianId,
        /// Status left through an override
        reopened_from: Option<OrderStatus>,
        /// Sale time
        delivered_at: DateTime<Utc>,
    },

    /// The order was soft-deleted
    OrderDeleted {
        /// Owning order
        order_id: OrderId,
        /// Deletion time
        deleted_at: DateTime<Utc>,
    },

    /// A soft-deleted order was brought back
    OrderRestored {
        /// Owning order
        order_id: OrderId,
        /// Restore time
        restored_at: DateTime<Utc>,
    },

    /// A printed receipt was attached to the device
    ReceiptAttached {
        /// Owning order
        order_id: OrderId,
        /// Document reference
        reference: String,
    },

    /// Money was received
    PaymentRecorded {
        /// The appended payment
        payment: Payment,
    },

    /// The register was closed
    RegisterClosed {
        /// The recorded closure
        closure: CashClosure,
    },
}

impl RepairEvent {
    /// Order the event concerns. `None` for register closures.
    #[must_use]
    pub const fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::OrderOpened { order_id, .. }
            | Self::DeviceLinked { order_id, .. }
            | Self::DiagnosisRecorded { order_id, .. }
            | Self::OrderDelivered { order_id, .. }
            | Self::OrderAbandoned { order_id, .. }
            | Self::QuickSaleCompleted { order_id, .. }
            | Self::OrderDeleted { order_id, .. }
            | Self::OrderRestored { order_id, .. }
            | Self::ReceiptAttached { order_id, .. } => Some(*order_id),
            Self::PaymentRecorded { payment } => Some(payment.order_id),
            Self::RegisterClosed { .. } => None,
        }
    }

    /// Stable event name, used for metric labels and logs
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OrderOpened { .. } => "order_opened",
            Self::DeviceLinked { .. } => "device_linked",
            Self::DiagnosisRecorded { .. } => "diagnosis_recorded",
            Self::OrderDelivered { .. } => "order_delivered",
            Self::OrderAbandoned { .. } => "order_abandoned",
            Self::QuickSaleCompleted { .. } => "quick_sale_completed",
            Self::OrderDeleted { .. } => "order_deleted",
            Self::OrderRestored { .. } => "order_restored",
            Self::ReceiptAttached { .. } => "receipt_attached",
            Self::PaymentRecorded { .. } => "payment_recorded",
            Self::RegisterClosed { .. } => "register_closed",
        }
    }

    /// Status the transition overrode, for administrative re-openings
    #[must_use]
    pub const fn reopened_from(&self) -> Option<OrderStatus> {
        match self {
            Self::DiagnosisRecorded { reopened_from, .. }
            | Self::OrderDelivered { reopened_from, .. }
            | Self::OrderAbandoned { reopened_from, .. }
            | Self::QuickSaleCompleted { reopened_from, .. } => *reopened_from,
            _ => None,
        }
    }
}
