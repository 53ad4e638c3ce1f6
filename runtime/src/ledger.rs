//! Payment ledger.
//!
//! Payments are only ever appended. Reading an order's history yields a
//! [`PaymentHistory`], a lazy stream that re-reads the store each time it is
//! started.

use crate::metrics::{DeskMetrics, LedgerMetrics};
use crate::publisher::EventPublisher;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use repairdesk_core::environment::IdGenerator;
use repairdesk_core::error::{ErrorKind, NotFound, RepairError, Result, ValidationError};
use repairdesk_core::events::RepairEvent;
use repairdesk_core::ledger::{Payment, PaymentMethod, PaymentQuery};
use repairdesk_core::order::{Order, OrderStatus};
use repairdesk_core::providers::{OrderStore, PaymentStore};
use repairdesk_core::types::{ActingTechnician, Money, OrderId};
use std::sync::Arc;

/// Append-only record of money received against orders
pub struct PaymentLedger<O, P> {
    orders: Arc<O>,
    payments: Arc<P>,
    ids: Arc<dyn IdGenerator>,
    publisher: EventPublisher,
}

impl<O, P> Clone for PaymentLedger<O, P> {
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
            payments: Arc::clone(&self.payments),
            ids: Arc::clone(&self.ids),
            publisher: self.publisher.clone(),
        }
    }
}

impl<O, P> PaymentLedger<O, P>
where
    O: OrderStore,
    P: PaymentStore,
{
    /// Creates a new ledger
    #[must_use]
    pub fn new(
        orders: Arc<O>,
        payments: Arc<P>,
        ids: Arc<dyn IdGenerator>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            orders,
            payments,
            ids,
            publisher,
        }
    }

    /// Record money received against an order.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidAmount`] if `amount` is zero or negative
    /// - [`ValidationError::AmountTooLarge`] above [`Money::MAX_PAYMENT`]
    /// - [`ValidationError::InvalidMethod`] for a method outside the accepted set
    /// - [`NotFound::Order`] if the order does not exist
    /// - [`ValidationError::OrderDeleted`] / [`ValidationError::OrderAbandoned`]
    ///   if the order cannot take payments
    /// - an upstream error if the store fails
    pub async fn record_payment(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
        technician: &ActingTechnician,
    ) -> Result<Payment> {
        let result: Result<Payment> = async {
            validate_payment(amount, method)?;
            let order = self.load(order_id).await?;
            ensure_payable(&order)?;

            let payment = Payment {
                id: self.ids.payment_id(),
                order_id,
                amount,
                method,
                paid_at,
                recorded_by: technician.id.clone(),
                cleared_by: None,
            };
            self.payments.append_payment(&payment).await?;
            Ok(payment)
        }
        .await;

        match result {
            Ok(payment) => {
                tracing::info!(
                    %order_id,
                    payment_id = %payment.id,
                    amount = %payment.amount,
                    method = ?payment.method,
                    technician = %technician.id,
                    "Payment recorded"
                );
                LedgerMetrics::record_payment(payment.method, payment.amount);
                self.publisher.publish(RepairEvent::PaymentRecorded {
                    payment: payment.clone(),
                });
                Ok(payment)
            },
            Err(error) => {
                if error.kind() == ErrorKind::Upstream {
                    tracing::error!(%order_id, %error, "Payment store failure");
                } else {
                    tracing::warn!(%order_id, %error, "Payment rejected");
                }
                DeskMetrics::record_rejection("record_payment", &error);
                Err(error)
            },
        }
    }

    /// Payments of one order, oldest first.
    ///
    /// Nothing is read until the returned history is streamed.
    #[must_use]
    pub fn payments(&self, order_id: OrderId) -> PaymentHistory<P> {
        PaymentHistory {
            store: Arc::clone(&self.payments),
            order_id,
        }
    }

    /// Sum of every payment on the order. A deleted order totals zero.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Order`] if the order does not exist, or an upstream
    /// error if a store fails.
    pub async fn total_for(&self, order_id: OrderId) -> Result<Money> {
        let order = self.load(order_id).await?;
        if order.deleted {
            tracing::debug!(%order_id, "Deleted order totals zero");
            return Ok(Money::ZERO);
        }
        let payments = self
            .payments
            .list_payments(&PaymentQuery::for_order(order_id))
            .await?;
        Ok(payments.iter().map(|p| p.amount).sum())
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| NotFound::Order(order_id).into())
    }
}

/// Restartable, lazy sequence of one order's payments
pub struct PaymentHistory<P> {
    store: Arc<P>,
    order_id: OrderId,
}

impl<P: PaymentStore> PaymentHistory<P> {
    /// Order the history belongs to
    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Start reading the history. Each call reads the store afresh.
    pub fn stream(&self) -> BoxStream<'_, Result<Payment>> {
        let query = PaymentQuery::for_order(self.order_id);
        stream::once(async move { self.store.list_payments(&query).await })
            .map_err(RepairError::from)
            .map_ok(|mut payments| {
                payments.sort_by_key(|p| (p.paid_at, p.id));
                stream::iter(payments.into_iter().map(Ok))
            })
            .try_flatten()
            .boxed()
    }

    /// Read the whole history into memory.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the store fails.
    pub async fn collect(&self) -> Result<Vec<Payment>> {
        self.stream().try_collect().await
    }

    /// Number of payments currently on file.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the store fails.
    pub async fn count(&self) -> Result<usize> {
        self.stream()
            .try_fold(0usize, |count, _| async move { Ok(count + 1) })
            .await
    }
}

/// Check amount and method before touching any store.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidAmount`], [`ValidationError::AmountTooLarge`]
/// or [`ValidationError::InvalidMethod`].
pub fn validate_payment(amount: Money, method: PaymentMethod) -> Result<()> {
    if !amount.is_positive() {
        return Err(ValidationError::InvalidAmount {
            cents: amount.cents(),
        }
        .into());
    }
    if amount > Money::MAX_PAYMENT {
        return Err(ValidationError::AmountTooLarge {
            cents: amount.cents(),
            max_cents: Money::MAX_PAYMENT.cents(),
        }
        .into());
    }
    if !method.is_accepted() {
        return Err(ValidationError::InvalidMethod {
            label: method.to_string(),
        }
        .into());
    }
    Ok(())
}

fn ensure_payable(order: &Order) -> Result<()> {
    if order.deleted {
        return Err(ValidationError::OrderDeleted(order.id).into());
    }
    if order.status == OrderStatus::Abandoned {
        return Err(ValidationError::OrderAbandoned(order.id).into());
    }
    Ok(())
}
