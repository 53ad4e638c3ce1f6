use super::{FaultSlot, lock};
use repairdesk_core::error::StoreError;
use repairdesk_core::order::Order;
use repairdesk_core::providers::{OrderQuery, OrderStore, StoreResult};
use repairdesk_core::types::OrderId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// In-memory order store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<Mutex<HashMap<OrderId, Order>>>,
    failing_save: FaultSlot,
    failing_read: FaultSlot,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store orders directly, bypassing the services (legacy data, fixtures).
    pub fn seed(&self, orders: impl IntoIterator<Item = Order>) {
        if let Ok(mut map) = self.orders.lock() {
            map.extend(orders.into_iter().map(|order| (order.id, order)));
        }
    }

    /// Current stored copy of an order.
    #[must_use]
    pub fn snapshot(&self, id: OrderId) -> Option<Order> {
        self.orders.lock().ok()?.get(&id).cloned()
    }

    /// Make the next `save_order` fail with `error`.
    pub fn fail_next_save(&self, error: StoreError) {
        self.failing_save.arm(error);
    }

    /// Make the next `get_order` or `list_orders` fail with `error`.
    pub fn fail_next_read(&self, error: StoreError) {
        self.failing_read.arm(error);
    }
}

impl OrderStore for InMemoryOrderStore {
    fn get_order(&self, id: OrderId) -> impl Future<Output = StoreResult<Option<Order>>> + Send {
        let orders = Arc::clone(&self.orders);
        let fault = self.failing_read.clone();

        async move {
            fault.take()?;
            Ok(lock(&orders)?.get(&id).cloned())
        }
    }

    fn save_order(&self, order: &Order) -> impl Future<Output = StoreResult<()>> + Send {
        let orders = Arc::clone(&self.orders);
        let fault = self.failing_save.clone();
        let order = order.clone();

        async move {
            fault.take()?;
            lock(&orders)?.insert(order.id, order);
            Ok(())
        }
    }

    fn list_orders(&self, query: &OrderQuery) -> impl Future<Output = StoreResult<Vec<Order>>> + Send {
        let orders = Arc::clone(&self.orders);
        let fault = self.failing_read.clone();
        let query = query.clone();

        async move {
            fault.take()?;
            let mut matching: Vec<Order> = lock(&orders)?
                .values()
                .filter(|order| query.matches(order))
                .cloned()
                .collect();
            matching.sort_by_key(|order| (order.created_at, order.id));
            Ok(matching)
        }
    }
}
