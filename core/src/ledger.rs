//! Payments received against repair orders.
//!
//! Payments are append-only. The only change a payment ever sees after it is
//! recorded is the `cleared_by` tag set by a register closure, and that tag is
//! written once.

use crate::types::{ClosureId, DateRange, Money, OrderId, PaymentId, TechnicianId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a payment was made
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash in the drawer
    #[serde(alias = "efectivo")]
    Cash,
    /// Yape wallet transfer
    Yape,
    /// Plin wallet transfer
    Plin,
    /// Bank transfer or deposit
    #[serde(alias = "transferencia")]
    BankTransfer,
    /// Debit or credit card
    #[serde(alias = "tarjeta")]
    Card,
    /// Unrecognized method in legacy data
    #[serde(other)]
    Unknown,
}

impl PaymentMethod {
    /// Every method a new payment may use
    pub const ACCEPTED: [Self; 5] = [Self::Cash, Self::Yape, Self::Plin, Self::BankTransfer, Self::Card];

    /// Parses a method label, English or Spanish, case-insensitive.
    ///
    /// Labels that match nothing become [`PaymentMethod::Unknown`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let folded = label.trim().to_lowercase().replace([' ', '-'], "_");
        match folded.as_str() {
            "cash" | "efectivo" => Self::Cash,
            "yape" => Self::Yape,
            "plin" => Self::Plin,
            "bank_transfer" | "banktransfer" | "transfer" | "transferencia" => Self::BankTransfer,
            "card" | "tarjeta" => Self::Card,
            _ => Self::Unknown,
        }
    }

    /// `true` for physical cash
    #[must_use]
    pub const fn is_cash(self) -> bool {
        matches!(self, Self::Cash)
    }

    /// `true` for methods accepted on new payments
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cash => write!(f, "Cash"),
            Self::Yape => write!(f, "Yape"),
            Self::Plin => write!(f, "Plin"),
            Self::BankTransfer => write!(f, "BankTransfer"),
            Self::Card => write!(f, "Card"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One discrete money receipt against an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment identifier
    pub id: PaymentId,
    /// Owning order
    pub order_id: OrderId,
    /// Amount received, always positive
    pub amount: Money,
    /// How it was paid
    pub method: PaymentMethod,
    /// When the money was received
    pub paid_at: DateTime<Utc>,
    /// Technician who recorded it
    pub recorded_by: TechnicianId,
    /// Closure that reconciled this payment, once cleared
    pub cleared_by: Option<ClosureId>,
}

impl Payment {
    /// `true` if no closure has consumed this payment yet
    #[must_use]
    pub const fn is_uncleared(&self) -> bool {
        self.cleared_by.is_none()
    }
}

/// Filter for listing payments from a payment store.
///
/// All criteria are combined with AND; unset criteria match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentQuery {
    /// Only payments owned by this order
    pub order_id: Option<OrderId>,
    /// Only payments recorded by this technician
    pub recorded_by: Option<TechnicianId>,
    /// Only payments received inside this window
    pub paid_within: Option<DateRange>,
    /// Clearing state to match
    pub clearing: Clearing,
}

/// Clearing-state criterion of a [`PaymentQuery`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Clearing {
    /// Cleared or not
    #[default]
    Any,
    /// Not yet consumed by a closure
    Uncleared,
    /// Consumed by this closure
    ClearedBy(ClosureId),
}

impl PaymentQuery {
    /// Payments owned by one order
    #[must_use]
    pub fn for_order(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Self::default()
        }
    }

    /// Every payment not yet consumed by a closure
    #[must_use]
    pub fn uncleared() -> Self {
        Self {
            clearing: Clearing::Uncleared,
            ..Self::default()
        }
    }

    /// Payments consumed by one closure
    #[must_use]
    pub fn cleared_by(closure_id: ClosureId) -> Self {
        Self {
            clearing: Clearing::ClearedBy(closure_id),
            ..Self::default()
        }
    }

    /// Restricts the query to a time window
    #[must_use]
    pub const fn within(mut self, range: DateRange) -> Self {
        self.paid_within = Some(range);
        self
    }

    /// `true` if `payment` satisfies every criterion
    #[must_use]
    pub fn matches(&self, payment: &Payment) -> bool {
        self.order_id.is_none_or(|id| payment.order_id == id)
            && self
                .recorded_by
                .as_ref()
                .is_none_or(|tech| &payment.recorded_by == tech)
            && self
                .paid_within
                .is_none_or(|range| range.contains(payment.paid_at))
            && match self.clearing {
                Clearing::Any => true,
                Clearing::Uncleared => payment.cleared_by.is_none(),
                Clearing::ClearedBy(closure) => payment.cleared_by == Some(closure),
            }
    }
}
