use super::{FaultSlot, lock};
use repairdesk_core::closure::{CashClosure, Page, SortOrder};
use repairdesk_core::error::StoreError;
use repairdesk_core::providers::{ClosureStore, StoreResult};
use repairdesk_core::types::ClosureId;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// In-memory closure store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClosureStore {
    closures: Arc<Mutex<Vec<CashClosure>>>,
    failing_save: FaultSlot,
}

impl InMemoryClosureStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded closures.
    #[must_use]
    pub fn closure_count(&self) -> usize {
        self.closures.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Make the next `save_closure` fail with `error`.
    pub fn fail_next_save(&self, error: StoreError) {
        self.failing_save.arm(error);
    }
}

impl ClosureStore for InMemoryClosureStore {
    fn save_closure(&self, closure: &CashClosure) -> impl Future<Output = StoreResult<()>> + Send {
        let closures = Arc::clone(&self.closures);
        let fault = self.failing_save.clone();
        let closure = closure.clone();

        async move {
            fault.take()?;
            let mut stored = lock(&closures)?;
            if stored.iter().any(|c| c.id == closure.id) {
                return Err(StoreError::Conflict(format!(
                    "closure {} already exists",
                    closure.id
                )));
            }
            stored.push(closure);
            Ok(())
        }
    }

    fn get_closure(
        &self,
        id: ClosureId,
    ) -> impl Future<Output = StoreResult<Option<CashClosure>>> + Send {
        let closures = Arc::clone(&self.closures);

        async move { Ok(lock(&closures)?.iter().find(|c| c.id == id).cloned()) }
    }

    fn list_closures(&self, page: Page) -> impl Future<Output = StoreResult<Vec<CashClosure>>> + Send {
        let closures = Arc::clone(&self.closures);

        async move {
            let mut history = lock(&closures)?.clone();
            history.sort_by_key(|c| c.created_at);
            if page.order == SortOrder::NewestFirst {
                history.reverse();
            }
            Ok(history.into_iter().skip(page.offset).take(page.limit).collect())
        }
    }
}
