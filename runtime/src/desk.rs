//! The front desk: every service wired to one set of backends.

use crate::config::DeskConfig;
use crate::ledger::PaymentLedger;
use crate::orders::OrderService;
use crate::publisher::EventPublisher;
use crate::register::CashRegister;
use crate::resolver::QrResolver;
use crate::stats::TechnicianStats;
use repairdesk_core::client::Client;
use repairdesk_core::environment::{Clock, IdGenerator};
use repairdesk_core::error::{Result, ValidationError};
use repairdesk_core::events::RepairEvent;
use repairdesk_core::ledger::{Payment, PaymentMethod};
use repairdesk_core::machine::{OrderCommand, OrderEnvironment};
use repairdesk_core::order::{Order, OrderStatus};
use repairdesk_core::providers::{
    ClosureStore, DeviceRegistry, DocumentGenerator, OrderStore, PaymentStore, ReceiptSnapshot,
};
use repairdesk_core::types::{ActingTechnician, Money, OrderId};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Collaborators the desk runs against
pub struct Backends<O, P, C, D, G> {
    /// Order store
    pub orders: Arc<O>,
    /// Payment store
    pub payments: Arc<P>,
    /// Closure store
    pub closures: Arc<C>,
    /// Device/client registry
    pub registry: Arc<D>,
    /// Receipt renderer
    pub documents: Arc<G>,
}

/// Outcome of [`FrontDesk::checkout`]
#[derive(Debug)]
pub struct Checkout {
    /// The recorded payment, which stands regardless of the delivery outcome
    pub payment: Payment,
    /// Delivery attempt, if one was made
    pub delivery: Option<Result<Order>>,
}

/// Repair shop front desk
pub struct FrontDesk<O, P, C, D, G> {
    config: DeskConfig,
    orders: OrderService<O, P, D>,
    ledger: PaymentLedger<O, P>,
    register: CashRegister<O, P, C>,
    resolver: QrResolver<D>,
    stats: TechnicianStats<O, P>,
    registry: Arc<D>,
    documents: Arc<G>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    publisher: EventPublisher,
}

impl<O, P, C, D, G> FrontDesk<O, P, C, D, G>
where
    O: OrderStore,
    P: PaymentStore,
    C: ClosureStore,
    D: DeviceRegistry,
    G: DocumentGenerator,
{
    /// Wire every service to `backends`
    #[must_use]
    pub fn new(
        config: DeskConfig,
        backends: Backends<O, P, C, D, G>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let publisher = EventPublisher::new(config.event_capacity);
        let env = OrderEnvironment::new(Arc::clone(&clock), Arc::clone(&ids), config.order_policy());

        let orders = OrderService::new(
            Arc::clone(&backends.orders),
            Arc::clone(&backends.payments),
            Arc::clone(&backends.registry),
            env,
            publisher.clone(),
        );
        let ledger = PaymentLedger::new(
            Arc::clone(&backends.orders),
            Arc::clone(&backends.payments),
            Arc::clone(&ids),
            publisher.clone(),
        );
        let register = CashRegister::new(
            Arc::clone(&backends.orders),
            Arc::clone(&backends.payments),
            backends.closures,
            Arc::clone(&clock),
            Arc::clone(&ids),
            publisher.clone(),
            config.closure_page_size,
        );
        let resolver = QrResolver::new(Arc::clone(&backends.registry));
        let stats = TechnicianStats::new(backends.orders, backends.payments, config.utc_offset());

        tracing::info!(
            ticket_prefix = %config.ticket_prefix,
            utc_offset_minutes = config.utc_offset_minutes,
            deliver_on_payment = config.deliver_on_payment,
            require_payment_for_delivery = config.require_payment_for_delivery,
            "Front desk ready"
        );

        Self {
            config,
            orders,
            ledger,
            register,
            resolver,
            stats,
            registry: backends.registry,
            documents: backends.documents,
            clock,
            ids,
            publisher,
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Order lifecycle
    #[must_use]
    pub const fn orders(&self) -> &OrderService<O, P, D> {
        &self.orders
    }

    /// Payment ledger
    #[must_use]
    pub const fn ledger(&self) -> &PaymentLedger<O, P> {
        &self.ledger
    }

    /// Cash register
    #[must_use]
    pub const fn register(&self) -> &CashRegister<O, P, C> {
        &self.register
    }

    /// QR resolver
    #[must_use]
    pub const fn resolver(&self) -> &QrResolver<D> {
        &self.resolver
    }

    /// Technician statistics
    #[must_use]
    pub const fn stats(&self) -> &TechnicianStats<O, P> {
        &self.stats
    }

    /// Subscribe to state-change events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RepairEvent> {
        self.publisher.subscribe()
    }

    /// Register a new client.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the registry fails.
    pub async fn register_client(
        &self,
        name: impl Into<String>,
        phone: Option<String>,
        document_number: Option<String>,
    ) -> Result<Client> {
        let client = Client {
            id: self.ids.client_id(),
            name: name.into(),
            phone,
            document_number,
        };
        self.registry.save_client(&client).await?;
        tracing::info!(client_id = %client.id, "Client registered");
        Ok(client)
    }

    /// Take a payment and, when configured, hand the device back.
    ///
    /// Orders already delivered or sold are not delivered again. A rejected
    /// delivery is reported in [`Checkout::delivery`]; the payment is kept.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`PaymentLedger::record_payment`].
    pub async fn checkout(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
        technician: &ActingTechnician,
    ) -> Result<Checkout> {
        let payment = self
            .ledger
            .record_payment(order_id, amount, method, self.clock.now(), technician)
            .await?;

        if !self.config.deliver_on_payment {
            return Ok(Checkout {
                payment,
                delivery: None,
            });
        }

        let delivery = match self.orders.get_order(order_id).await {
            Ok(order) if matches!(order.status, OrderStatus::Delivered | OrderStatus::QuickSale) => {
                tracing::debug!(%order_id, status = %order.status, "Already handed over");
                None
            },
            Ok(_) => Some(self.orders.deliver(order_id, technician, None, None).await),
            Err(error) => Some(Err(error)),
        };
        if let Some(Err(error)) = &delivery {
            tracing::warn!(%order_id, payment_id = %payment.id, %error, "Payment kept, delivery not completed");
        }
        Ok(Checkout { payment, delivery })
    }

    /// Render a receipt for the order and record its reference on the device.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Order`](repairdesk_core::error::NotFound::Order) for an
    /// unknown order, a validation error if the order is deleted, or an upstream
    /// error if a store or the renderer fails.
    pub async fn issue_receipt(&self, order_id: OrderId, technician: &ActingTechnician) -> Result<Order> {
        let order = self.orders.get_order(order_id).await?;
        if order.deleted {
            return Err(ValidationError::OrderDeleted(order_id).into());
        }
        let payments = self.ledger.payments(order_id).collect().await?;
        let total_paid = payments.iter().map(|p| p.amount).sum();
        let client = match order.client_id {
            Some(id) => self.registry.get_client(id).await?,
            None => None,
        };

        let snapshot = ReceiptSnapshot {
            order,
            payments,
            total_paid,
            client,
            issued_at: self.clock.now(),
            issued_by: technician.id.clone(),
        };
        let reference = self.documents.render_receipt(&snapshot).await?;
        tracing::info!(%order_id, %reference, "Receipt rendered");

        self.orders
            .execute(order_id, OrderCommand::AttachReceipt { reference })
            .await
    }
}
