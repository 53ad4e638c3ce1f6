//! Order lifecycle service.
//!
//! Runs [`OrderReducer`] against stored orders. Every write follows the same
//! shape: load, reduce a copy, persist, publish. The registry record is
//! written before the order. If the order write then fails, the record is put
//! back as it was, so a failed command leaves both stores at their previous
//! state and can be retried.

use crate::metrics::DeskMetrics;
use crate::publisher::EventPublisher;
use chrono::{DateTime, Utc};
use repairdesk_core::client::{Client, DeviceRecord};
use repairdesk_core::error::{ErrorKind, NotFound, Result};
use repairdesk_core::ledger::PaymentQuery;
use repairdesk_core::machine::{OrderCommand, OrderEnvironment, OrderIntake, OrderReducer};
use repairdesk_core::order::Order;
use repairdesk_core::providers::{DeviceRegistry, OrderQuery, OrderStore, PaymentStore};
use repairdesk_core::reducer::Reducer;
use repairdesk_core::types::{ActingTechnician, Money, OrderId, QrToken, ServiceType};
use std::sync::Arc;

/// Diagnosis details entered by the technician
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnosis {
    /// Diagnosis text
    pub text: String,
    /// Photo of the fault
    pub image_ref: Option<String>,
    /// Proforma cost, if quoted
    pub declared_cost: Option<Money>,
}

impl Diagnosis {
    /// Diagnosis with text only
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_ref: None,
            declared_cost: None,
        }
    }

    /// Attach a proforma cost
    #[must_use]
    pub const fn with_cost(mut self, cost: Money) -> Self {
        self.declared_cost = Some(cost);
        self
    }

    /// Attach a photo reference
    #[must_use]
    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }
}

/// Order lifecycle service
pub struct OrderService<O, P, D> {
    orders: Arc<O>,
    payments: Arc<P>,
    registry: Arc<D>,
    env: OrderEnvironment,
    publisher: EventPublisher,
}

impl<O, P, D> Clone for OrderService<O, P, D> {
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
            payments: Arc::clone(&self.payments),
            registry: Arc::clone(&self.registry),
            env: self.env.clone(),
            publisher: self.publisher.clone(),
        }
    }
}

impl<O, P, D> OrderService<O, P, D>
where
    O: OrderStore,
    P: PaymentStore,
    D: DeviceRegistry,
{
    /// Creates a new order service
    #[must_use]
    pub const fn new(
        orders: Arc<O>,
        payments: Arc<P>,
        registry: Arc<D>,
        env: OrderEnvironment,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            orders,
            payments,
            registry,
            env,
            publisher,
        }
    }

    /// Take in a new order.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank problem description, or an
    /// upstream error if the order cannot be saved.
    pub async fn open_order(&self, intake: OrderIntake) -> Result<Order> {
        let result: Result<Order> = async {
            let (order, event) = OrderReducer::open(intake, &self.env)?;
            self.orders.save_order(&order).await?;
            tracing::info!(order_id = %order.id, ticket = %order.ticket, "Order opened");
            self.publisher.publish(event);
            Ok(order)
        }
        .await;
        Self::report("open", result)
    }

    /// Fetch an order.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Order`] if it does not exist.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        tracing::debug!(%order_id, "Loading order");
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| NotFound::Order(order_id).into())
    }

    /// List orders.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the store fails.
    pub async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders(query).await?)
    }

    /// Apply a command to a stored order and return the updated order.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Order`] for an unknown order, a validation error if
    /// the reducer rejects the command, or an upstream error if persisting fails.
    /// The stored order is unchanged in every error case.
    pub async fn execute(&self, order_id: OrderId, command: OrderCommand) -> Result<Order> {
        let action = command.action();
        let result: Result<Order> = async {
            let current = self.get_order(order_id).await?;
            let mut next = current.clone();
            let event = OrderReducer.reduce(&mut next, command, &self.env)?;
            self.persist(&current, &next).await?;
            tracing::info!(
                %order_id,
                ticket = %next.ticket,
                event = event.event_type(),
                from = %current.status,
                to = %next.status,
                "Order updated"
            );
            self.publisher.publish(event);
            Ok(next)
        }
        .await;
        Self::report(action, result)
    }

    /// Bind a scanned token to the order's device.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyToken`](repairdesk_core::error::ValidationError::EmptyToken)
    /// for a blank scan, plus the errors of [`execute`](Self::execute).
    pub async fn link_device(
        &self,
        order_id: OrderId,
        raw_token: &str,
        service_type: ServiceType,
        technician: &ActingTechnician,
    ) -> Result<Order> {
        let token = QrToken::parse(raw_token)?;
        self.execute(
            order_id,
            OrderCommand::LinkDevice {
                token,
                service_type,
                technician: technician.clone(),
            },
        )
        .await
    }

    /// Record the diagnosis.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn record_diagnosis(
        &self,
        order_id: OrderId,
        diagnosis: Diagnosis,
        technician: &ActingTechnician,
        override_reason: Option<String>,
    ) -> Result<Order> {
        self.execute(
            order_id,
            OrderCommand::RecordDiagnosis {
                diagnosis: diagnosis.text,
                image_ref: diagnosis.image_ref,
                declared_cost: diagnosis.declared_cost,
                technician: technician.clone(),
                override_reason,
            },
        )
        .await
    }

    /// Hand the device back.
    ///
    /// The payments already on file are looked up here so the delivery policy
    /// can be checked.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn deliver(
        &self,
        order_id: OrderId,
        technician: &ActingTechnician,
        final_cost: Option<Money>,
        override_reason: Option<String>,
    ) -> Result<Order> {
        let payments_on_file: Money = match self
            .payments
            .list_payments(&PaymentQuery::for_order(order_id))
            .await
        {
            Ok(payments) => payments.iter().map(|p| p.amount).sum(),
            Err(error) => return Self::report("deliver", Err(error.into())),
        };
        self.execute(
            order_id,
            OrderCommand::Deliver {
                technician: technician.clone(),
                final_cost,
                payments_on_file,
                override_reason,
            },
        )
        .await
    }

    /// Mark the order abandoned.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn abandon(
        &self,
        order_id: OrderId,
        abandoned_at: DateTime<Utc>,
        override_reason: Option<String>,
    ) -> Result<Order> {
        self.execute(
            order_id,
            OrderCommand::Abandon {
                abandoned_at,
                override_reason,
            },
        )
        .await
    }

    /// Complete a walk-in sale.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn quick_sale(
        &self,
        order_id: OrderId,
        technician: &ActingTechnician,
        override_reason: Option<String>,
    ) -> Result<Order> {
        self.execute(
            order_id,
            OrderCommand::QuickSale {
                technician: technician.clone(),
                override_reason,
            },
        )
        .await
    }

    /// Soft-delete the order.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn mark_deleted(&self, order_id: OrderId) -> Result<Order> {
        self.execute(order_id, OrderCommand::MarkDeleted).await
    }

    /// Undo a soft deletion.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn restore(&self, order_id: OrderId) -> Result<Order> {
        self.execute(order_id, OrderCommand::Restore).await
    }

    async fn persist(&self, current: &Order, next: &Order) -> Result<()> {
        if next.device.qr_token.is_none() {
            self.orders.save_order(next).await?;
            return Ok(());
        }

        let previous = self.visit_record(current).await?;
        let client = match &previous {
            Some(record) => record.client.clone(),
            None => self.client_snapshot(next).await?,
        };
        if let Some(record) = DeviceRecord::of(next, client) {
            self.registry.save_device(&record).await?;
        }
        if let Err(error) = self.orders.save_order(next).await {
            self.roll_back(next, previous).await;
            return Err(error.into());
        }
        Ok(())
    }

    /// Registry record of this visit before the command ran
    async fn visit_record(&self, order: &Order) -> Result<Option<DeviceRecord>> {
        let Some(token) = &order.device.qr_token else {
            return Ok(None);
        };
        let records = self.registry.records_by_token(token).await?;
        Ok(records
            .into_iter()
            .find(|r| r.order_id == order.id && r.device.id == order.device.id))
    }

    async fn client_snapshot(&self, order: &Order) -> Result<Option<Client>> {
        match order.client_id {
            Some(id) => Ok(self.registry.get_client(id).await?),
            None => Ok(None),
        }
    }

    async fn roll_back(&self, order: &Order, previous: Option<DeviceRecord>) {
        let undo = match previous {
            Some(record) => self.registry.save_device(&record).await,
            None => self.registry.remove_device(order.device.id).await,
        };
        match undo {
            Ok(()) => tracing::debug!(order_id = %order.id, "Registry record rolled back"),
            Err(error) => tracing::error!(
                order_id = %order.id,
                device_id = %order.device.id,
                %error,
                "Registry record left ahead of its order"
            ),
        }
    }

    fn report<T>(operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            match error.kind() {
                ErrorKind::Upstream => tracing::error!(operation, %error, "Order store failure"),
                ErrorKind::NotFound => tracing::warn!(operation, %error, "Order not found"),
                _ => {},
            }
            DeskMetrics::record_rejection(operation, error);
        }
        result
    }

    /// Environment used for transitions
    #[must_use]
    pub const fn environment(&self) -> &OrderEnvironment {
        &self.env
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use repairdesk_core::error::{RepairError, StoreError, ValidationError};
    use repairdesk_core::machine::OrderPolicy;
    use repairdesk_core::order::OrderStatus;
    use repairdesk_testing::fixtures;
    use repairdesk_testing::mocks::{
        InMemoryDeviceRegistry, InMemoryOrderStore, InMemoryPaymentStore,
    };

    type Service = OrderService<InMemoryOrderStore, InMemoryPaymentStore, InMemoryDeviceRegistry>;

    fn service() -> (Service, InMemoryOrderStore, InMemoryDeviceRegistry) {
        let orders = InMemoryOrderStore::new();
        let registry = InMemoryDeviceRegistry::new();
        let service = OrderService::new(
            Arc::new(orders.clone()),
            Arc::new(InMemoryPaymentStore::new()),
            Arc::new(registry.clone()),
            fixtures::order_env(),
            EventPublisher::new(16),
        );
        (service, orders, registry)
    }

    #[tokio::test]
    async fn open_persists_and_publishes() {
        let (service, orders, _) = service();
        let mut events = service.publisher.subscribe();

        let order = service
            .open_order(fixtures::intake("No carga", "Xiaomi Note 10"))
            .await
            .unwrap();

        assert_eq!(orders.snapshot(order.id), Some(order.clone()));
        assert_eq!(events.recv().await.unwrap().event_type(), "order_opened");
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (service, _, _) = service();
        let id = OrderId::new();
        let err = service.mark_deleted(id).await.unwrap_err();
        assert_eq!(err, RepairError::from(NotFound::Order(id)));
    }

    #[tokio::test]
    async fn failed_save_leaves_stored_order_unchanged() {
        let (service, orders, _) = service();
        let tech = fixtures::technician("tech-1");
        let order = service
            .open_order(fixtures::intake("No carga", "Xiaomi Note 10"))
            .await
            .unwrap();

        orders.fail_next_save(StoreError::Unavailable("timeout".into()));
        let err = service
            .record_diagnosis(order.id, Diagnosis::new("Batería"), &tech, None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(orders.snapshot(order.id).unwrap().status, OrderStatus::Pending);

        let retried = service
            .record_diagnosis(order.id, Diagnosis::new("Batería"), &tech, None)
            .await
            .unwrap();
        assert_eq!(retried.status, OrderStatus::Diagnosed);
    }

    #[tokio::test]
    async fn linking_writes_registry_record() {
        let (service, _, registry) = service();
        let order = service
            .open_order(fixtures::intake("Pantalla", "iPad"))
            .await
            .unwrap();
        service
            .link_device(order.id, " QR-9 ", ServiceType::Workshop, &fixtures::technician("tech-1"))
            .await
            .unwrap();
        assert_eq!(registry.record_count(), 1);

        let err = service
            .link_device(order.id, "   ", ServiceType::Workshop, &fixtures::technician("tech-1"))
            .await
            .unwrap_err();
        assert_eq!(err, RepairError::from(ValidationError::EmptyToken));
    }

    #[tokio::test]
    async fn failed_order_save_rolls_back_registry_record() {
        let (service, orders, registry) = service();
        let tech = fixtures::technician("tech-1");
        let order = service
            .open_order(fixtures::intake("Pantalla", "iPad"))
            .await
            .unwrap();

        orders.fail_next_save(StoreError::Unavailable("timeout".into()));
        service
            .link_device(order.id, "QR-9", ServiceType::Workshop, &tech)
            .await
            .unwrap_err();
        assert_eq!(registry.record_count(), 0);
        assert_eq!(orders.snapshot(order.id).unwrap().device.qr_token, None);

        service
            .link_device(order.id, "QR-9", ServiceType::Workshop, &tech)
            .await
            .unwrap();
        orders.fail_next_save(StoreError::Unavailable("timeout".into()));
        service
            .record_diagnosis(order.id, Diagnosis::new("Flex roto"), &tech, None)
            .await
            .unwrap_err();

        let token = QrToken::parse("qr-9").unwrap();
        let records = registry.records_by_token(&token).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device.diagnosis, None);
    }

    #[tokio::test]
    async fn strict_policy_blocks_unpaid_delivery() {
        let orders = InMemoryOrderStore::new();
        let env = fixtures::order_env_with(
            Arc::new(repairdesk_testing::test_clock()),
            OrderPolicy {
                require_payment_for_delivery: true,
                ..OrderPolicy::default()
            },
        );
        let service: Service = OrderService::new(
            Arc::new(orders),
            Arc::new(InMemoryPaymentStore::new()),
            Arc::new(InMemoryDeviceRegistry::new()),
            env,
            EventPublisher::new(4),
        );
        let tech = fixtures::technician("tech-1");
        let order = service.open_order(fixtures::intake("Teclado", "HP")).await.unwrap();
        service
            .record_diagnosis(order.id, Diagnosis::new("Teclado roto"), &tech, None)
            .await
            .unwrap();

        let err = service.deliver(order.id, &tech, None, None).await.unwrap_err();
        assert_eq!(err, RepairError::from(ValidationError::PaymentRequired(order.id)));
    }
}
