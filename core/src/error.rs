//! Error types for repair desk operations.
//!
//! Every operation in the core fails with a [`RepairError`]. Its variants map
//! one-to-one onto the failure kinds the outer application reacts to: re-prompt
//! the operator ([`RepairError::Validation`]), show a missing-record message
//! ([`RepairError::NotFound`]), re-fetch and retry ([`RepairError::Conflict`],
//! [`RepairError::PartialClose`]) or surface a collaborator outage
//! ([`RepairError::Upstream`]).

use crate::types::{ClosureId, DeviceId, OrderId, PaymentId};
use thiserror::Error;

/// Result type alias for repair desk operations.
pub type Result<T> = std::result::Result<T, RepairError>;

/// Error surfaced by every repair desk operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepairError {
    /// Malformed input; the caller should re-prompt.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(#[from] NotFound),

    /// The operation collided with concurrent work; re-fetch and retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A register closure could not mark its payments atomically.
    ///
    /// No closure was recorded. Retry with a fresh `close_register` call.
    #[error("Register closure {closure_id} was not completed: {reason}")]
    PartialClose {
        /// Id the aborted closure would have had
        closure_id: ClosureId,
        /// What went wrong while marking or saving
        reason: String,
    },

    /// A storage or registry collaborator failed.
    #[error("Upstream failure: {0}")]
    Upstream(#[from] StoreError),
}

/// Flat classification of [`RepairError`], for callers that only branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`RepairError::Validation`]
    Validation,
    /// See [`RepairError::NotFound`]
    NotFound,
    /// See [`RepairError::Conflict`]
    Conflict,
    /// See [`RepairError::PartialClose`]
    PartialClose,
    /// See [`RepairError::Upstream`]
    Upstream,
}

impl RepairError {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::PartialClose { .. } => ErrorKind::PartialClose,
            Self::Upstream(_) => ErrorKind::Upstream,
        }
    }

    /// Returns `true` if re-fetching and retrying the same operation may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use repairdesk_core::error::{RepairError, StoreError, ValidationError};
    /// assert!(RepairError::Conflict("closure in flight".into()).is_retryable());
    /// assert!(RepairError::from(StoreError::Unavailable("timeout".into())).is_retryable());
    /// assert!(!RepairError::from(ValidationError::EmptyDiagnosis).is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict(_) | Self::PartialClose { .. } => true,
            Self::Upstream(store) => store.is_transient(),
            Self::Validation(_) | Self::NotFound(_) => false,
        }
    }
}

/// Concrete validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Diagnosis text was empty or whitespace.
    #[error("Diagnosis text cannot be empty")]
    EmptyDiagnosis,

    /// Problem description on intake was empty or whitespace.
    #[error("Problem description cannot be empty")]
    EmptyProblemDescription,

    /// Payment amount was zero or negative.
    #[error("Invalid amount {cents} cents: payments must be positive")]
    InvalidAmount {
        /// Offending amount in cents
        cents: i64,
    },

    /// Payment amount above the single-payment ceiling.
    #[error("Amount {cents} cents exceeds the {max_cents} cents limit for one payment")]
    AmountTooLarge {
        /// Offending amount in cents
        cents: i64,
        /// Ceiling in cents
        max_cents: i64,
    },

    /// Payment method outside the accepted set.
    #[error("Invalid payment method: {label}")]
    InvalidMethod {
        /// Label of the rejected method
        label: String,
    },

    /// Amount text could not be parsed.
    #[error("Malformed amount: {0:?}")]
    MalformedAmount(String),

    /// A cost was negative.
    #[error("Cost cannot be negative ({cents} cents)")]
    NegativeCost {
        /// Offending amount in cents
        cents: i64,
    },

    /// Technician id was blank.
    #[error("Technician id cannot be blank")]
    BlankTechnician,

    /// Scanned token was empty after normalization.
    #[error("QR token cannot be empty")]
    EmptyToken,

    /// The transition is not defined from the current status.
    #[error("Cannot {action} an order in status {from}")]
    IllegalTransition {
        /// Current status label
        from: String,
        /// Attempted transition
        action: &'static str,
    },

    /// Leaving a terminal status needs an explicit override reason.
    #[error("Order is {from}; reopening it to {action} requires an override reason")]
    OverrideRequired {
        /// Current status label
        from: String,
        /// Attempted transition
        action: &'static str,
    },

    /// The order is soft-deleted.
    #[error("Order {0} is deleted")]
    OrderDeleted(OrderId),

    /// The order was abandoned and must be reopened before taking payments.
    #[error("Order {0} is abandoned")]
    OrderAbandoned(OrderId),

    /// Delivery requires a recorded payment under the current policy.
    #[error("Order {0} has no recorded payment; delivery is blocked")]
    PaymentRequired(OrderId),

    /// Date range with `from` after `to`.
    #[error("Date range start is after its end")]
    InvertedRange,

    /// Pagination with a zero page size.
    #[error("Page size must be greater than zero")]
    EmptyPage,
}

/// A referenced record that does not exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotFound {
    /// No order with this id
    #[error("order {0}")]
    Order(OrderId),
    /// No device with this id
    #[error("device {0}")]
    Device(DeviceId),
    /// No payment with this id
    #[error("payment {0}")]
    Payment(PaymentId),
    /// No closure with this id
    #[error("closure {0}")]
    Closure(ClosureId),
}

/// Errors reported by storage and registry collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or timed out; the call can be retried.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The write collided with another writer.
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// `true` for failures that may go away on retry
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}
