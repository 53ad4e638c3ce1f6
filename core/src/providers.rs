//! Collaborator interfaces.
//!
//! The core never talks to storage, the device/client registry or the
//! document renderer directly. Services depend on these traits and the
//! application provides concrete implementations.
//!
//! Every method is asynchronous and fallible with [`StoreError`]. Timeouts and
//! retry policy belong to the implementation; the services propagate the error
//! unchanged as [`RepairError::Upstream`](crate::error::RepairError::Upstream).

use crate::client::{Client, DeviceRecord};
use crate::closure::{CashClosure, Page};
use crate::error::StoreError;
use crate::ledger::{Payment, PaymentQuery};
use crate::order::{Order, OrderStatus};
use crate::types::{
    ClientId, ClosureId, DateRange, DeviceId, Money, OrderId, PaymentId, QrToken, TechnicianId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Result type for collaborator calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Filter for listing orders.
///
/// Deleted orders are skipped unless `include_deleted` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only orders in this status
    pub status: Option<OrderStatus>,
    /// Only orders diagnosed by this technician
    pub diagnosed_by: Option<TechnicianId>,
    /// Only orders created inside this window
    pub created_within: Option<DateRange>,
    /// Also return soft-deleted orders
    pub include_deleted: bool,
}

impl OrderQuery {
    /// Live orders diagnosed by `technician`
    #[must_use]
    pub fn diagnosed_by(technician: TechnicianId) -> Self {
        Self {
            diagnosed_by: Some(technician),
            ..Self::default()
        }
    }

    /// `true` if `order` satisfies every criterion
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        (self.include_deleted || !order.deleted)
            && self.status.is_none_or(|status| order.status == status)
            && self
                .diagnosed_by
                .as_ref()
                .is_none_or(|tech| order.device.diagnosing_technician.as_ref() == Some(tech))
            && self
                .created_within
                .is_none_or(|range| range.contains(order.created_at))
    }
}

/// Everything a printable receipt shows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSnapshot {
    /// Order with its device, as of issuing
    pub order: Order,
    /// Payments received so far, oldest first
    pub payments: Vec<Payment>,
    /// Sum of `payments`
    pub total_paid: Money,
    /// Owner of the device, when known
    pub client: Option<Client>,
    /// Issue time
    pub issued_at: DateTime<Utc>,
    /// Technician issuing the receipt
    pub issued_by: TechnicianId,
}

/// Persistence for orders and the device each one owns
pub trait OrderStore: Send + Sync {
    /// Get order by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails. A missing order is `Ok(None)`.
    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = StoreResult<Option<Order>>> + Send;

    /// Insert or replace an order.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn save_order(&self, order: &Order) -> impl Future<Output = StoreResult<()>> + Send;

    /// List orders matching `query`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn list_orders(
        &self,
        query: &OrderQuery,
    ) -> impl Future<Output = StoreResult<Vec<Order>>> + Send;
}

/// Append-only payment storage
pub trait PaymentStore: Send + Sync {
    /// Append a new payment.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or the id already exists.
    fn append_payment(&self, payment: &Payment) -> impl Future<Output = StoreResult<()>> + Send;

    /// List payments matching `query`, in `paid_at` order.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn list_payments(
        &self,
        query: &PaymentQuery,
    ) -> impl Future<Output = StoreResult<Vec<Payment>>> + Send;

    /// Tag every payment in `ids` as cleared by `closure`.
    ///
    /// Implementations should apply the whole batch or nothing and report how
    /// many payments were tagged. The closure engine treats any count other
    /// than `ids.len()` as a failed closure.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a payment is already cleared, or
    /// another error if the backend fails.
    fn clear_payments(
        &self,
        ids: &[PaymentId],
        closure: ClosureId,
    ) -> impl Future<Output = StoreResult<usize>> + Send;

    /// Remove the `closure` tag from `ids`, for a closure that was never recorded.
    ///
    /// Payments tagged by any other closure are left alone.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn release_payments(
        &self,
        ids: &[PaymentId],
        closure: ClosureId,
    ) -> impl Future<Output = StoreResult<usize>> + Send;
}

/// Storage for register closures
pub trait ClosureStore: Send + Sync {
    /// Record a closure. Closures are never updated afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or the id already exists.
    fn save_closure(&self, closure: &CashClosure) -> impl Future<Output = StoreResult<()>> + Send;

    /// Get closure by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails. A missing closure is `Ok(None)`.
    fn get_closure(
        &self,
        id: ClosureId,
    ) -> impl Future<Output = StoreResult<Option<CashClosure>>> + Send;

    /// One page of closure history, ordered by `created_at`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn list_closures(&self, page: Page) -> impl Future<Output = StoreResult<Vec<CashClosure>>> + Send;
}

/// The external device/client registry
pub trait DeviceRegistry: Send + Sync {
    /// Every visit recorded under `token`, newest `linked_at` first. The
    /// first record is the device's current identity; an empty list means
    /// the token was never linked.
    ///
    /// Records with equal `linked_at` keep the order they were first saved in,
    /// newest save first.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn records_by_token(
        &self,
        token: &QrToken,
    ) -> impl Future<Output = StoreResult<Vec<DeviceRecord>>> + Send;

    /// Insert or replace the record of one visit, keyed by device id.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn save_device(&self, record: &DeviceRecord) -> impl Future<Output = StoreResult<()>> + Send;

    /// Drop the record of one visit. Removing an unknown device is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn remove_device(&self, device_id: DeviceId) -> impl Future<Output = StoreResult<()>> + Send;

    /// Get client by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails. A missing client is `Ok(None)`.
    fn get_client(
        &self,
        id: ClientId,
    ) -> impl Future<Output = StoreResult<Option<Client>>> + Send;

    /// Insert or replace a client.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn save_client(&self, client: &Client) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Printable document renderer
pub trait DocumentGenerator: Send + Sync {
    /// Render a receipt and return a reference to the stored document.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or storing the document fails.
    fn render_receipt(
        &self,
        snapshot: &ReceiptSnapshot,
    ) -> impl Future<Output = StoreResult<String>> + Send;
}
