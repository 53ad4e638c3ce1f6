use super::{FaultSlot, lock};
use repairdesk_core::client::{Client, DeviceRecord};
use repairdesk_core::error::StoreError;
use repairdesk_core::providers::{DeviceRegistry, StoreResult};
use repairdesk_core::types::{ClientId, DeviceId, QrToken};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// In-memory device/client registry.
///
/// Device records are kept in save order; re-saving a device replaces its
/// record in place.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeviceRegistry {
    devices: Arc<Mutex<Vec<DeviceRecord>>>,
    clients: Arc<Mutex<HashMap<ClientId, Client>>>,
    failing_save: FaultSlot,
    failing_read: FaultSlot,
}

impl InMemoryDeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of device records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.devices.lock().map(|d| d.len()).unwrap_or_default()
    }

    /// Make the next `save_device`, `remove_device` or `save_client` fail with `error`.
    pub fn fail_next_save(&self, error: StoreError) {
        self.failing_save.arm(error);
    }

    /// Make the next lookup fail with `error`.
    pub fn fail_next_read(&self, error: StoreError) {
        self.failing_read.arm(error);
    }
}

impl DeviceRegistry for InMemoryDeviceRegistry {
    fn records_by_token(
        &self,
        token: &QrToken,
    ) -> impl Future<Output = StoreResult<Vec<DeviceRecord>>> + Send {
        let devices = Arc::clone(&self.devices);
        let fault = self.failing_read.clone();
        let token = token.clone();

        async move {
            fault.take()?;
            let mut history: Vec<DeviceRecord> = lock(&devices)?
                .iter()
                .rev()
                .filter(|record| record.token == token)
                .cloned()
                .collect();
            history.sort_by(|a, b| b.linked_at.cmp(&a.linked_at));
            Ok(history)
        }
    }

    fn save_device(&self, record: &DeviceRecord) -> impl Future<Output = StoreResult<()>> + Send {
        let devices = Arc::clone(&self.devices);
        let fault = self.failing_save.clone();
        let record = record.clone();

        async move {
            fault.take()?;
            let mut stored = lock(&devices)?;
            match stored.iter_mut().find(|r| r.device.id == record.device.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
            Ok(())
        }
    }

    fn remove_device(&self, device_id: DeviceId) -> impl Future<Output = StoreResult<()>> + Send {
        let devices = Arc::clone(&self.devices);
        let fault = self.failing_save.clone();

        async move {
            fault.take()?;
            lock(&devices)?.retain(|r| r.device.id != device_id);
            Ok(())
        }
    }

    fn get_client(&self, id: ClientId) -> impl Future<Output = StoreResult<Option<Client>>> + Send {
        let clients = Arc::clone(&self.clients);
        let fault = self.failing_read.clone();

        async move {
            fault.take()?;
            Ok(lock(&clients)?.get(&id).cloned())
        }
    }

    fn save_client(&self, client: &Client) -> impl Future<Output = StoreResult<()>> + Send {
        let clients = Arc::clone(&self.clients);
        let fault = self.failing_save.clone();
        let client = client.clone();

        async move {
            fault.take()?;
            lock(&clients)?.insert(client.id, client);
            Ok(())
        }
    }
}
