//! Shared setup for the front desk integration tests

#![allow(dead_code)] // Not every test binary uses every helper
#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use repairdesk_core::machine::OrderIntake;
use repairdesk_core::order::Order;
use repairdesk_core::types::ActingTechnician;
use repairdesk_runtime::{Backends, DeskConfig, Diagnosis, FrontDesk};
use repairdesk_testing::fixtures;
use repairdesk_testing::mocks::{
    InMemoryClosureStore, InMemoryDeviceRegistry, InMemoryOrderStore, InMemoryPaymentStore,
    ManualClock, SequentialIds, StubDocumentGenerator,
};
use std::sync::Arc;

/// Desk over the in-memory backends
pub type Desk = FrontDesk<
    InMemoryOrderStore,
    InMemoryPaymentStore,
    InMemoryClosureStore,
    InMemoryDeviceRegistry,
    StubDocumentGenerator,
>;

/// A desk plus handles on its backends for inspection and fault injection
pub struct TestDesk {
    pub desk: Desk,
    pub orders: InMemoryOrderStore,
    pub payments: InMemoryPaymentStore,
    pub closures: InMemoryClosureStore,
    pub registry: InMemoryDeviceRegistry,
    pub documents: StubDocumentGenerator,
    pub clock: ManualClock,
}

impl TestDesk {
    /// Desk with default configuration, clock at 2025-03-10 15:00 UTC
    pub fn new() -> Self {
        Self::with_config(DeskConfig::default())
    }

    pub fn with_config(config: DeskConfig) -> Self {
        repairdesk_testing::init_tracing();

        let orders = InMemoryOrderStore::new();
        let payments = InMemoryPaymentStore::new();
        let closures = InMemoryClosureStore::new();
        let registry = InMemoryDeviceRegistry::new();
        let documents = StubDocumentGenerator::new();
        let clock = ManualClock::new(fixtures::march(10, 15));

        let desk = FrontDesk::new(
            config,
            Backends {
                orders: Arc::new(orders.clone()),
                payments: Arc::new(payments.clone()),
                closures: Arc::new(closures.clone()),
                registry: Arc::new(registry.clone()),
                documents: Arc::new(documents.clone()),
            },
            Arc::new(clock.clone()),
            Arc::new(SequentialIds::new()),
        );

        Self {
            desk,
            orders,
            payments,
            closures,
            registry,
            documents,
            clock,
        }
    }

    /// Open a walk-in order
    pub async fn open(&self, problem: &str) -> Order {
        self.desk
            .orders()
            .open_order(fixtures::intake(problem, "Samsung A52"))
            .await
            .unwrap()
    }

    /// Open an order for a registered client
    pub async fn open_for(&self, intake: OrderIntake) -> Order {
        self.desk.orders().open_order(intake).await.unwrap()
    }

    /// Open an order and diagnose it as `tech`
    pub async fn diagnosed(&self, problem: &str, tech: &ActingTechnician) -> Order {
        let order = self.open(problem).await;
        self.desk
            .orders()
            .record_diagnosis(order.id, Diagnosis::new("Revisado"), tech, None)
            .await
            .unwrap()
    }
}
