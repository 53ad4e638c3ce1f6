//! Records kept by the external device/client registry.

use crate::order::{Device, Order};
use crate::types::{ClientId, OrderId, QrToken, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shop client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier
    pub id: ClientId,
    /// Full name
    pub name: String,
    /// Contact phone
    pub phone: Option<String>,
    /// National id or tax number
    pub document_number: Option<String>,
}

/// One visit of a physical device, as indexed by the registry.
///
/// Each repair visit produces its own record, so a returning device has one
/// record per order sharing the same token. The client is copied in when the
/// visit is first linked and keeps that copy for the life of the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device state at the last write
    pub device: Device,
    /// Token the record is indexed under
    pub token: QrToken,
    /// Order the device belongs to for this visit
    pub order_id: OrderId,
    /// Ticket of that order
    pub ticket: Ticket,
    /// Client who brought it in, as registered at link time
    #[serde(default)]
    pub client: Option<Client>,
    /// When the token was bound for this visit
    pub linked_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// Snapshot of an order's device with the visit's client.
    /// `None` until the device has been linked.
    #[must_use]
    pub fn of(order: &Order, client: Option<Client>) -> Option<Self> {
        let token = order.device.qr_token.clone()?;
        let linked_at = order.device.linked_at.unwrap_or(order.created_at);
        Some(Self {
            device: order.device.clone(),
            token,
            order_id: order.id,
            ticket: order.ticket.clone(),
            client,
            linked_at,
        })
    }
}
