//! Integration tests for register closures
//!
//! Covers the closure guarantees: a payment is cleared by at most one
//! closure, its clearing never changes, and two closures never run at once.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::TestDesk;
use proptest::prelude::*;
use repairdesk_core::closure::{CashClosure, Page, SortOrder, UnclearedFilter};
use repairdesk_core::environment::RandomIds;
use repairdesk_core::error::{ErrorKind, RepairError, StoreError};
use repairdesk_core::ledger::{Payment, PaymentMethod, PaymentQuery};
use repairdesk_core::machine::OrderReducer;
use repairdesk_core::providers::{PaymentStore, StoreResult};
use repairdesk_core::types::{ClosureId, Money, PaymentId};
use repairdesk_runtime::{CashRegister, EventPublisher};
use repairdesk_testing::mocks::{
    InMemoryClosureStore, InMemoryOrderStore, InMemoryPaymentStore, SequentialIds,
};
use repairdesk_testing::{fixtures, properties, test_clock};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

// ============================================================================
// Test Fixtures
// ============================================================================

/// Which payment store call waits for a permit
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gated {
    Reads,
    Clears,
}

/// Payment store that holds one kind of call until a permit is added, to stop
/// a closure mid-flight
#[derive(Clone)]
struct GatedPayments {
    inner: InMemoryPaymentStore,
    gate: Arc<Semaphore>,
    gated: Gated,
}

impl GatedPayments {
    fn gate_for(&self, call: Gated) -> Option<Arc<Semaphore>> {
        (self.gated == call).then(|| Arc::clone(&self.gate))
    }
}

async fn pass(gate: Option<Arc<Semaphore>>) -> StoreResult<()> {
    if let Some(gate) = gate {
        let _permit = gate
            .acquire()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    }
    Ok(())
}

impl PaymentStore for GatedPayments {
    fn append_payment(&self, payment: &Payment) -> impl Future<Output = StoreResult<()>> + Send {
        self.inner.append_payment(payment)
    }

    fn list_payments(
        &self,
        query: &PaymentQuery,
    ) -> impl Future<Output = StoreResult<Vec<Payment>>> + Send {
        let gate = self.gate_for(Gated::Reads);
        let read = self.inner.list_payments(query);
        async move {
            pass(gate).await?;
            read.await
        }
    }

    fn clear_payments(
        &self,
        ids: &[PaymentId],
        closure: ClosureId,
    ) -> impl Future<Output = StoreResult<usize>> + Send {
        let gate = self.gate_for(Gated::Clears);
        let clear = self.inner.clear_payments(ids, closure);
        async move {
            pass(gate).await?;
            clear.await
        }
    }

    fn release_payments(
        &self,
        ids: &[PaymentId],
        closure: ClosureId,
    ) -> impl Future<Output = StoreResult<usize>> + Send {
        self.inner.release_payments(ids, closure)
    }
}

async fn pay(t: &TestDesk, soles: i64, method: PaymentMethod) -> Payment {
    let tech = fixtures::technician("tech-1");
    let order = t.open("Reparación").await;
    t.desk
        .ledger()
        .record_payment(order.id, Money::from_soles(soles), method, fixtures::march(10, 15), &tech)
        .await
        .unwrap()
}

// ============================================================================
// Clearing
// ============================================================================

#[tokio::test]
async fn cleared_payments_keep_their_closure() {
    let t = TestDesk::new();
    let tech = fixtures::technician("tech-1");
    let early = pay(&t, 40, PaymentMethod::Cash).await;
    let first = t
        .desk
        .register()
        .close_register(Money::from_soles(40), &tech)
        .await
        .unwrap();

    let late = pay(&t, 15, PaymentMethod::Yape).await;
    let second = t
        .desk
        .register()
        .close_register(Money::from_soles(15), &tech)
        .await
        .unwrap();

    let all = t.payments.all();
    let cleared_by = |id: PaymentId| all.iter().find(|p| p.id == id).unwrap().cleared_by;
    assert_eq!(cleared_by(early.id), Some(first.id));
    assert_eq!(cleared_by(late.id), Some(second.id));
    assert_eq!(second.payment_count, 1);
    assert_eq!(second.cash_total, Money::ZERO);
    assert_eq!(second.electronic_total, Money::from_soles(15));

    // Re-clearing an already cleared payment is a conflict at the store
    let err = t
        .payments
        .clear_payments(&[early.id], second.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    let still = t.payments.all().into_iter().find(|p| p.id == early.id).unwrap();
    assert_eq!(still.cleared_by, Some(first.id));
}

#[tokio::test]
async fn declared_amount_is_recorded_as_counted() {
    let t = TestDesk::new();
    pay(&t, 100, PaymentMethod::Cash).await;
    let closure = t
        .desk
        .register()
        .close_register(Money::parse("95.50").unwrap(), &fixtures::technician("tech-2"))
        .await
        .unwrap();
    assert_eq!(closure.declared_total, Money::from_cents(9_550));
    assert_eq!(closure.discrepancy(), Money::from_cents(-450));
    assert_eq!(closure.technician_id.as_str(), "tech-2");
}

#[tokio::test]
async fn partial_marking_is_never_accepted() {
    let t = TestDesk::new();
    let tech = fixtures::technician("tech-1");
    for soles in [10, 20, 30] {
        pay(&t, soles, PaymentMethod::Cash).await;
    }
    t.payments.clear_at_most(2);

    let err = t
        .desk
        .register()
        .close_register(Money::from_soles(60), &tech)
        .await
        .unwrap_err();
    let RepairError::PartialClose { reason, .. } = &err else {
        panic!("expected a partial close, got {err:?}");
    };
    assert!(reason.contains("2 of 3"));
    assert_eq!(t.closures.closure_count(), 0);
    assert!(t.payments.all().iter().all(Payment::is_uncleared));

    let summary = t
        .desk
        .register()
        .compute_uncleared(&UnclearedFilter::default())
        .await
        .unwrap();
    assert_eq!(summary.grand_total, Money::from_soles(60));
}

#[tokio::test]
async fn upstream_failure_before_marking_is_propagated() {
    let t = TestDesk::new();
    pay(&t, 10, PaymentMethod::Cash).await;
    t.payments
        .fail_next_clear(StoreError::Unavailable("ledger offline".into()));

    let err = t
        .desk
        .register()
        .close_register(Money::from_soles(10), &fixtures::technician("tech-1"))
        .await
        .unwrap_err();
    assert_eq!(err, RepairError::Upstream(StoreError::Unavailable("ledger offline".into())));
    assert_eq!(t.closures.closure_count(), 0);
}

#[tokio::test]
async fn closure_history_pages() {
    let t = TestDesk::new();
    let tech = fixtures::technician("tech-1");
    let mut closed: Vec<CashClosure> = Vec::new();
    for _ in 0..3 {
        closed.push(t.desk.register().close_register(Money::ZERO, &tech).await.unwrap());
        t.clock.advance(chrono::Duration::minutes(10));
    }

    let oldest_first = Page::new(0, 2, SortOrder::OldestFirst).unwrap();
    let page = t.desk.register().closures(Some(oldest_first)).await.unwrap();
    assert_eq!(page, closed[..2].to_vec());

    let rest = t
        .desk
        .register()
        .closures(Some(oldest_first.next()))
        .await
        .unwrap();
    assert_eq!(rest, closed[2..].to_vec());

    let newest = t.desk.register().closures(None).await.unwrap();
    assert_eq!(newest[0], closed[2]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn second_closure_while_one_is_in_flight_conflicts() {
    let orders = InMemoryOrderStore::new();
    let inner = InMemoryPaymentStore::new();
    let gate = Arc::new(Semaphore::new(0));
    let register = CashRegister::new(
        Arc::new(orders),
        Arc::new(GatedPayments {
            inner: inner.clone(),
            gate: Arc::clone(&gate),
            gated: Gated::Reads,
        }),
        Arc::new(InMemoryClosureStore::new()),
        Arc::new(test_clock()),
        Arc::new(SequentialIds::new()),
        EventPublisher::new(4),
        20,
    );

    let first = tokio::spawn({
        let register = register.clone();
        async move {
            register
                .close_register(Money::ZERO, &fixtures::technician("tech-1"))
                .await
        }
    });
    while !register.is_closing() {
        tokio::task::yield_now().await;
    }

    let err = register
        .close_register(Money::ZERO, &fixtures::technician("tech-2"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.is_retryable());

    gate.add_permits(1);
    let closure = first.await.unwrap().unwrap();
    assert_eq!(closure.technician_id.as_str(), "tech-1");
    assert!(!register.is_closing());
}

#[tokio::test]
async fn registers_with_separate_locks_never_clear_the_same_payment() {
    let orders = InMemoryOrderStore::new();
    let payments = InMemoryPaymentStore::new();
    let closures = InMemoryClosureStore::new();
    let (order, _) =
        OrderReducer::open(fixtures::intake("Parlante", "JBL Flip"), &fixtures::order_env()).unwrap();
    orders.seed([order.clone()]);
    let payment = fixtures::payment(order.id, Money::from_soles(25), PaymentMethod::Cash);
    payments.seed([payment.clone()]);

    // Two registers, each with its own lock, over the same stores
    let gate = Arc::new(Semaphore::new(0));
    let slow = CashRegister::new(
        Arc::new(orders.clone()),
        Arc::new(GatedPayments {
            inner: payments.clone(),
            gate: Arc::clone(&gate),
            gated: Gated::Clears,
        }),
        Arc::new(closures.clone()),
        Arc::new(test_clock()),
        Arc::new(RandomIds),
        EventPublisher::new(4),
        20,
    );
    let fast = CashRegister::new(
        Arc::new(orders),
        Arc::new(payments.clone()),
        Arc::new(closures.clone()),
        Arc::new(test_clock()),
        Arc::new(RandomIds),
        EventPublisher::new(4),
        20,
    );

    let pending = tokio::spawn({
        let slow = slow.clone();
        async move {
            slow.close_register(Money::from_soles(25), &fixtures::technician("tech-1"))
                .await
        }
    });
    while !slow.is_closing() {
        tokio::task::yield_now().await;
    }

    let closed = fast
        .close_register(Money::from_soles(25), &fixtures::technician("tech-2"))
        .await
        .unwrap();
    assert_eq!(closed.payment_count, 1);

    gate.add_permits(1);
    let err = pending.await.unwrap().unwrap_err();
    let RepairError::PartialClose { reason, .. } = &err else {
        panic!("expected a partial close, got {err:?}");
    };
    assert!(reason.contains("already cleared"));
    assert_eq!(closures.closure_count(), 1);
    let stored = payments.all().into_iter().find(|p| p.id == payment.id).unwrap();
    assert_eq!(stored.cleared_by, Some(closed.id));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn closures_clear_disjoint_sets(
        batches in prop::collection::vec(
            prop::collection::vec((properties::positive_cents(), properties::accepted_method()), 0..4),
            1..5,
        )
    ) {
        tokio_test::block_on(async {
            let t = TestDesk::new();
            let tech = fixtures::technician("tech-1");
            let mut recorded = 0usize;
            let mut closures = Vec::new();

            for batch in &batches {
                let order = t.open("Lote").await;
                for (cents, method) in batch {
                    t.desk
                        .ledger()
                        .record_payment(order.id, Money::from_cents(*cents), *method, fixtures::march(10, 15), &tech)
                        .await
                        .unwrap();
                    recorded += 1;
                }
                closures.push(t.desk.register().close_register(Money::ZERO, &tech).await.unwrap());
            }

            let mut seen: HashSet<PaymentId> = HashSet::new();
            for closure in &closures {
                let detail = t.desk.register().closure_detail(closure.id).await.unwrap();
                assert_eq!(detail.payments.len(), closure.payment_count);
                for payment in detail.payments {
                    assert!(seen.insert(payment.id), "payment cleared twice");
                }
            }
            assert_eq!(seen.len(), recorded);
        });
    }
}
