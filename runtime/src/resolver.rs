//! QR identity resolution.
//!
//! Maps a scanned tag to the device's service history. Matching is exact on
//! the normalized token; two scans that normalize the same are one device.

use crate::metrics::{DeskMetrics, ResolverMetrics};
use repairdesk_core::client::{Client, DeviceRecord};
use repairdesk_core::error::Result;
use repairdesk_core::order::Device;
use repairdesk_core::providers::DeviceRegistry;
use repairdesk_core::types::{OrderId, QrToken, Ticket};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// One past visit of a device, frozen as it was recorded
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    /// Order of the visit
    pub order_id: OrderId,
    /// Ticket of the visit
    pub ticket: Ticket,
    /// Device state for that visit, with its own diagnosis and image
    pub device: Device,
    /// Client as registered when the visit was linked
    pub client: Option<Client>,
    /// When the token was bound for the visit
    pub linked_at: DateTime<Utc>,
}

/// Outcome of scanning a tag
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    /// Tag never seen; the next link will create the first record
    NewClient {
        /// Normalized token
        token: QrToken,
    },
    /// Tag seen before
    Returning {
        /// Normalized token
        token: QrToken,
        /// Most recent visit
        current: ServiceRecord,
        /// Every visit, newest first, `current` included
        history: Vec<ServiceRecord>,
    },
}

impl Resolution {
    /// Normalized token that was resolved
    #[must_use]
    pub const fn token(&self) -> &QrToken {
        match self {
            Self::NewClient { token } | Self::Returning { token, .. } => token,
        }
    }

    /// `true` if the device has been seen before
    #[must_use]
    pub const fn is_returning(&self) -> bool {
        matches!(self, Self::Returning { .. })
    }

    /// Most recent visit, if any
    #[must_use]
    pub const fn current(&self) -> Option<&ServiceRecord> {
        match self {
            Self::NewClient { .. } => None,
            Self::Returning { current, .. } => Some(current),
        }
    }

    /// Every visit, newest first
    #[must_use]
    pub fn history(&self) -> &[ServiceRecord] {
        match self {
            Self::NewClient { .. } => &[],
            Self::Returning { history, .. } => history,
        }
    }
}

/// Resolves scanned tags against the device registry
pub struct QrResolver<D> {
    registry: Arc<D>,
}

impl<D> Clone for QrResolver<D> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<D: DeviceRegistry> QrResolver<D> {
    /// Creates a new resolver
    #[must_use]
    pub const fn new(registry: Arc<D>) -> Self {
        Self { registry }
    }

    /// Resolve a raw scan.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyToken`](repairdesk_core::error::ValidationError::EmptyToken)
    /// for a blank scan, or an upstream error if the registry fails.
    pub async fn resolve(&self, raw: &str) -> Result<Resolution> {
        let result = self.lookup(raw).await;
        match &result {
            Ok(resolution) => {
                let outcome = if resolution.is_returning() { "returning" } else { "new_client" };
                ResolverMetrics::record_resolution(outcome);
                tracing::info!(
                    token = %resolution.token(),
                    outcome,
                    visits = resolution.history().len(),
                    "QR resolved"
                );
            },
            Err(error) => {
                DeskMetrics::record_rejection("resolve_qr", error);
                tracing::warn!(%error, "QR resolution failed");
            },
        }
        result
    }

    async fn lookup(&self, raw: &str) -> Result<Resolution> {
        let token = QrToken::parse(raw)?;
        tracing::debug!(%token, "Looking up device history");
        let history: Vec<ServiceRecord> = self
            .registry
            .records_by_token(&token)
            .await?
            .into_iter()
            .map(snapshot)
            .collect();
        let Some(current) = history.first().cloned() else {
            return Ok(Resolution::NewClient { token });
        };
        Ok(Resolution::Returning {
            token,
            current,
            history,
        })
    }
}

fn snapshot(record: DeviceRecord) -> ServiceRecord {
    ServiceRecord {
        order_id: record.order_id,
        ticket: record.ticket,
        device: record.device,
        client: record.client,
        linked_at: record.linked_at,
    }
}
