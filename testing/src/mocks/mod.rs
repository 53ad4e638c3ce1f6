//! Mock implementations of the environment and collaborator traits.
//!
//! Every store keeps its data behind `Arc<Mutex<..>>`, so clones share state
//! and a test can hand one clone to a service while inspecting another.

mod clock;
mod closures;
mod documents;
mod orders;
mod payments;
mod registry;

pub use clock::{FixedClock, ManualClock, SequentialIds, test_clock};
pub use closures::InMemoryClosureStore;
pub use documents::StubDocumentGenerator;
pub use orders::InMemoryOrderStore;
pub use payments::InMemoryPaymentStore;
pub use registry::InMemoryDeviceRegistry;

use repairdesk_core::error::StoreError;
use repairdesk_core::providers::StoreResult;
use std::sync::{Arc, Mutex, MutexGuard};

/// Locks a mock's state, reporting poisoning as an unavailable backend.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("Mutex lock failed".to_string()))
}

/// One-shot injected failure.
///
/// `arm` stores an error; the next `take` returns it and disarms the slot.
#[derive(Debug, Clone, Default)]
pub(crate) struct FaultSlot {
    pending: Arc<Mutex<Option<StoreError>>>,
}

impl FaultSlot {
    pub(crate) fn arm(&self, error: StoreError) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(error);
        }
    }

    pub(crate) fn take(&self) -> StoreResult<()> {
        match lock(&self.pending)?.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
