use super::{FaultSlot, lock};
use repairdesk_core::error::StoreError;
use repairdesk_core::ledger::{Payment, PaymentQuery};
use repairdesk_core::providers::{PaymentStore, StoreResult};
use repairdesk_core::types::{ClosureId, PaymentId};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// In-memory payment store.
///
/// Clearing is all-or-nothing unless a test caps it with
/// [`clear_at_most`](Self::clear_at_most) to simulate a backend that stops
/// half way through a batch.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    payments: Arc<Mutex<Vec<Payment>>>,
    clear_cap: Arc<Mutex<Option<usize>>>,
    failing_append: FaultSlot,
    failing_read: FaultSlot,
    failing_clear: FaultSlot,
    failing_release: FaultSlot,
}

impl InMemoryPaymentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store payments directly, bypassing the ledger (legacy data, fixtures).
    pub fn seed(&self, payments: impl IntoIterator<Item = Payment>) {
        if let Ok(mut stored) = self.payments.lock() {
            stored.extend(payments);
        }
    }

    /// Every stored payment, in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<Payment> {
        self.payments.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of stored payments.
    #[must_use]
    pub fn payment_count(&self) -> usize {
        self.payments.lock().map(|p| p.len()).unwrap_or_default()
    }

    /// Make the next `append_payment` fail with `error`.
    pub fn fail_next_append(&self, error: StoreError) {
        self.failing_append.arm(error);
    }

    /// Make the next `list_payments` fail with `error`.
    pub fn fail_next_read(&self, error: StoreError) {
        self.failing_read.arm(error);
    }

    /// Make the next `clear_payments` fail with `error` before tagging anything.
    pub fn fail_next_clear(&self, error: StoreError) {
        self.failing_clear.arm(error);
    }

    /// Make the next `release_payments` fail with `error`.
    pub fn fail_next_release(&self, error: StoreError) {
        self.failing_release.arm(error);
    }

    /// Let the next `clear_payments` tag only the first `n` payments of its batch.
    pub fn clear_at_most(&self, n: usize) {
        if let Ok(mut cap) = self.clear_cap.lock() {
            *cap = Some(n);
        }
    }
}

impl PaymentStore for InMemoryPaymentStore {
    fn append_payment(&self, payment: &Payment) -> impl Future<Output = StoreResult<()>> + Send {
        let payments = Arc::clone(&self.payments);
        let fault = self.failing_append.clone();
        let payment = payment.clone();

        async move {
            fault.take()?;
            let mut stored = lock(&payments)?;
            if stored.iter().any(|p| p.id == payment.id) {
                return Err(StoreError::Conflict(format!(
                    "payment {} already exists",
                    payment.id
                )));
            }
            stored.push(payment);
            Ok(())
        }
    }

    fn list_payments(
        &self,
        query: &PaymentQuery,
    ) -> impl Future<Output = StoreResult<Vec<Payment>>> + Send {
        let payments = Arc::clone(&self.payments);
        let fault = self.failing_read.clone();
        let query = query.clone();

        async move {
            fault.take()?;
            let mut matching: Vec<Payment> = lock(&payments)?
                .iter()
                .filter(|payment| query.matches(payment))
                .cloned()
                .collect();
            matching.sort_by_key(|payment| payment.paid_at);
            Ok(matching)
        }
    }

    fn clear_payments(
        &self,
        ids: &[PaymentId],
        closure: ClosureId,
    ) -> impl Future<Output = StoreResult<usize>> + Send {
        let payments = Arc::clone(&self.payments);
        let cap = Arc::clone(&self.clear_cap);
        let fault = self.failing_clear.clone();
        let ids = ids.to_vec();

        async move {
            fault.take()?;
            let mut stored = lock(&payments)?;

            for id in &ids {
                match stored.iter().find(|p| p.id == *id) {
                    None => {
                        return Err(StoreError::Conflict(format!("payment {id} does not exist")));
                    },
                    Some(payment) if payment.cleared_by.is_some() => {
                        return Err(StoreError::Conflict(format!(
                            "payment {id} is already cleared"
                        )));
                    },
                    Some(_) => {},
                }
            }

            let limit = lock(&cap)?.take().unwrap_or(ids.len()).min(ids.len());
            for id in &ids[..limit] {
                if let Some(payment) = stored.iter_mut().find(|p| p.id == *id) {
                    payment.cleared_by = Some(closure);
                }
            }
            Ok(limit)
        }
    }

    fn release_payments(
        &self,
        ids: &[PaymentId],
        closure: ClosureId,
    ) -> impl Future<Output = StoreResult<usize>> + Send {
        let payments = Arc::clone(&self.payments);
        let fault = self.failing_release.clone();
        let ids = ids.to_vec();

        async move {
            fault.take()?;
            let mut released = 0;
            for payment in lock(&payments)?.iter_mut() {
                if ids.contains(&payment.id) && payment.cleared_by == Some(closure) {
                    payment.cleared_by = None;
                    released += 1;
                }
            }
            Ok(released)
        }
    }
}
