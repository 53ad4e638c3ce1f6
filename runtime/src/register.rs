//! Cash closure engine.
//!
//! Reconciles uncleared payments into [`CashClosure`] snapshots. A closure
//! re-reads the ledger when it commits, tags every payment it counted, and
//! only then records itself. At most one closure runs at a time per
//! [`CashRegister`] and its clones.

use crate::metrics::{ClosureMetrics, DeskMetrics};
use crate::publisher::EventPublisher;
use repairdesk_core::closure::{CashClosure, Page, UnclearedFilter, UnclearedSummary};
use repairdesk_core::environment::{Clock, IdGenerator};
use repairdesk_core::error::{ErrorKind, NotFound, RepairError, Result, StoreError};
use repairdesk_core::events::RepairEvent;
use repairdesk_core::ledger::{Payment, PaymentQuery};
use repairdesk_core::order::Order;
use repairdesk_core::providers::{ClosureStore, OrderStore, PaymentStore};
use repairdesk_core::types::{ActingTechnician, ClosureId, Money, OrderId, PaymentId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// A closure together with the payments it reconciled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureDetail {
    /// The closure
    pub closure: CashClosure,
    /// Payments cleared by it, oldest first
    pub payments: Vec<Payment>,
}

/// Cash register reconciliation
pub struct CashRegister<O, P, C> {
    orders: Arc<O>,
    payments: Arc<P>,
    closures: Arc<C>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    publisher: EventPublisher,
    closing: Arc<Mutex<()>>,
    page_size: usize,
}

impl<O, P, C> Clone for CashRegister<O, P, C> {
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
            payments: Arc::clone(&self.payments),
            closures: Arc::clone(&self.closures),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
            publisher: self.publisher.clone(),
            closing: Arc::clone(&self.closing),
            page_size: self.page_size,
        }
    }
}

impl<O, P, C> CashRegister<O, P, C>
where
    O: OrderStore,
    P: PaymentStore,
    C: ClosureStore,
{
    /// Creates a new register. `page_size` is used when history is listed without a page.
    #[must_use]
    pub fn new(
        orders: Arc<O>,
        payments: Arc<P>,
        closures: Arc<C>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        publisher: EventPublisher,
        page_size: usize,
    ) -> Self {
        Self {
            orders,
            payments,
            closures,
            clock,
            ids,
            publisher,
            closing: Arc::new(Mutex::new(())),
            page_size,
        }
    }

    /// Totals of the payments not yet reconciled.
    ///
    /// Payments of deleted orders are left out. The technician filter keeps
    /// payments whose order was received or diagnosed by that technician.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Order`] if a payment points at an order that does
    /// not exist, or an upstream error if a store fails.
    pub async fn compute_uncleared(&self, filter: &UnclearedFilter) -> Result<UnclearedSummary> {
        let mut query = PaymentQuery::uncleared();
        if let Some(range) = filter.paid_within {
            query = query.within(range);
        }
        let payments = self.payments.list_payments(&query).await?;
        let orders = self.owning_orders(&payments).await?;

        let included = payments.iter().filter(|payment| {
            orders.get(&payment.order_id).is_some_and(|order| {
                order.is_countable()
                    && filter
                        .technician
                        .as_ref()
                        .is_none_or(|tech| order.device.handled_by(tech))
            })
        });
        let summary = UnclearedSummary::from_payments(included);
        tracing::debug!(
            payments = summary.payment_ids.len(),
            orders = summary.order_count,
            grand_total = %summary.grand_total,
            "Computed uncleared totals"
        );
        Ok(summary)
    }

    /// Close the register.
    ///
    /// Recomputes the uncleared totals, tags every counted payment with the new
    /// closure id and records the closure. `declared` is stored next to the
    /// ledger totals as counted; a mismatch is not an error. With nothing to
    /// reconcile a zero closure is still recorded.
    ///
    /// Only one closure runs at a time per register and its clones. The lock
    /// lives in this process: registers in separate processes sharing one
    /// payment store are kept apart only by the store's refusal to clear an
    /// already cleared payment, which surfaces here as a partial close.
    ///
    /// # Errors
    ///
    /// - [`RepairError::Conflict`] if another closure is in flight
    /// - [`RepairError::PartialClose`] if the payments could not all be tagged
    ///   or the closure could not be saved; no closure exists afterwards
    /// - an upstream error if a store fails before anything is tagged
    pub async fn close_register(
        &self,
        declared: Money,
        technician: &ActingTechnician,
    ) -> Result<CashClosure> {
        let started = Instant::now();
        let result = self.try_close(declared, technician).await;
        match &result {
            Ok(closure) => {
                ClosureMetrics::record_closure(started.elapsed());
                tracing::info!(
                    closure_id = %closure.id,
                    technician = %closure.technician_id,
                    payments = closure.payment_count,
                    cash_total = %closure.cash_total,
                    electronic_total = %closure.electronic_total,
                    declared_total = %closure.declared_total,
                    discrepancy = %closure.discrepancy(),
                    "Register closed"
                );
                self.publisher.publish(RepairEvent::RegisterClosed {
                    closure: closure.clone(),
                });
            },
            Err(error) => {
                let reason = match error.kind() {
                    ErrorKind::Conflict => "in_flight",
                    ErrorKind::PartialClose => "partial",
                    ErrorKind::NotFound => "not_found",
                    ErrorKind::Validation => "validation",
                    ErrorKind::Upstream => "upstream",
                };
                ClosureMetrics::record_failure(reason);
                DeskMetrics::record_rejection("close_register", error);
                if error.kind() == ErrorKind::Conflict {
                    tracing::warn!(technician = %technician.id, %error, "Register closure refused");
                } else {
                    tracing::error!(technician = %technician.id, %error, "Register closure failed");
                }
            },
        }
        result
    }

    /// `true` while a closure is being committed
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.closing.try_lock().is_err()
    }

    /// One page of closure history. Without a page, the newest
    /// `page_size` closures are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPage`](repairdesk_core::error::ValidationError::EmptyPage)
    /// if the configured page size is zero, or an upstream error if the store fails.
    pub async fn closures(&self, page: Option<Page>) -> Result<Vec<CashClosure>> {
        let page = match page {
            Some(page) => page,
            None => Page::first(self.page_size)?,
        };
        Ok(self.closures.list_closures(page).await?)
    }

    /// A closure and the payments it cleared.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Closure`] if the closure does not exist, or an
    /// upstream error if a store fails.
    pub async fn closure_detail(&self, closure_id: ClosureId) -> Result<ClosureDetail> {
        let closure = self
            .closures
            .get_closure(closure_id)
            .await?
            .ok_or(NotFound::Closure(closure_id))?;
        let payments = self
            .payments
            .list_payments(&PaymentQuery::cleared_by(closure_id))
            .await?;
        Ok(ClosureDetail { closure, payments })
    }

    async fn try_close(&self, declared: Money, technician: &ActingTechnician) -> Result<CashClosure> {
        let Ok(_guard) = self.closing.try_lock() else {
            return Err(RepairError::Conflict(
                "another register closure is in flight".to_string(),
            ));
        };

        let summary = self.compute_uncleared(&UnclearedFilter::default()).await?;
        let closure = CashClosure {
            id: self.ids.closure_id(),
            created_at: self.clock.now(),
            declared_total: declared,
            cash_total: summary.cash_total,
            electronic_total: summary.electronic_total,
            technician_id: technician.id.clone(),
            payment_count: summary.payment_ids.len(),
        };

        self.mark(closure.id, &summary.payment_ids).await?;

        if let Err(error) = self.closures.save_closure(&closure).await {
            let reason = self
                .release(closure.id, &summary.payment_ids, format!("closure could not be saved: {error}"))
                .await;
            return Err(RepairError::PartialClose {
                closure_id: closure.id,
                reason,
            });
        }
        Ok(closure)
    }

    async fn mark(&self, closure_id: ClosureId, ids: &[PaymentId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        match self.payments.clear_payments(ids, closure_id).await {
            Ok(marked) if marked == ids.len() => Ok(()),
            Ok(marked) => {
                let reason = self
                    .release(closure_id, ids, format!("marked {marked} of {} payments", ids.len()))
                    .await;
                Err(RepairError::PartialClose { closure_id, reason })
            },
            Err(StoreError::Conflict(detail)) => {
                let reason = self
                    .release(closure_id, ids, format!("payment already cleared: {detail}"))
                    .await;
                Err(RepairError::PartialClose { closure_id, reason })
            },
            Err(error) => {
                self.release(closure_id, ids, error.to_string()).await;
                Err(error.into())
            },
        }
    }

    /// Undo the tags of a closure that will not be recorded. Returns `reason`,
    /// extended if the release itself failed.
    async fn release(&self, closure_id: ClosureId, ids: &[PaymentId], reason: String) -> String {
        match self.payments.release_payments(ids, closure_id).await {
            Ok(released) => {
                tracing::warn!(%closure_id, released, %reason, "Released payments of aborted closure");
                reason
            },
            Err(error) => {
                tracing::error!(
                    %closure_id,
                    %error,
                    "Payments may still be tagged by an unrecorded closure"
                );
                format!("{reason}; release failed: {error}")
            },
        }
    }

    async fn owning_orders(&self, payments: &[Payment]) -> Result<HashMap<OrderId, Order>> {
        let ids: BTreeSet<OrderId> = payments.iter().map(|p| p.order_id).collect();
        let mut orders = HashMap::with_capacity(ids.len());
        for id in ids {
            let order = self
                .orders
                .get_order(id)
                .await?
                .ok_or(NotFound::Order(id))?;
            orders.insert(id, order);
        }
        Ok(orders)
    }
}
