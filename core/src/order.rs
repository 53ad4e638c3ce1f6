//! Repair orders and the device each order owns.
//!
//! An order moves `Pending → Diagnosed → Delivered`, may branch to `Abandoned`
//! from either open status, and has a `Pending → QuickSale` fast path for
//! walk-in sales. Soft-deleted orders keep their status but are excluded from
//! every financial and statistical view.

use crate::error::{Result, StoreError};
use crate::types::{
    ClientId, DeviceId, Money, OrderId, QrToken, ServiceType, TechnicianId, Ticket,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of an order in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Received, waiting for diagnosis
    #[serde(alias = "pendiente")]
    Pending,
    /// Diagnosis recorded, waiting for pickup
    #[serde(alias = "diagnosticado")]
    Diagnosed,
    /// Handed back to the client
    #[serde(alias = "entregado")]
    Delivered,
    /// Client never came back
    #[serde(alias = "abandonado")]
    Abandoned,
    /// Walk-in sale with no diagnosis step
    #[serde(alias = "venta_rapida")]
    QuickSale,
    /// Unrecognized status in legacy data
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Parses a stored status label, English or Spanish, case-insensitive.
    ///
    /// Labels that match nothing become [`OrderStatus::Unknown`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let folded = label.trim().to_lowercase().replace([' ', '-'], "_");
        match folded.as_str() {
            "pending" | "pendiente" => Self::Pending,
            "diagnosed" | "diagnosticado" => Self::Diagnosed,
            "delivered" | "entregado" => Self::Delivered,
            "abandoned" | "abandonado" => Self::Abandoned,
            "quick_sale" | "quicksale" | "venta_rapida" | "venta_rápida" => Self::QuickSale,
            _ => Self::Unknown,
        }
    }

    /// `true` for statuses that end the normal flow
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Abandoned | Self::QuickSale)
    }

    /// `true` if leaving this status needs an explicit override.
    ///
    /// Terminal statuses and statuses we cannot interpret both qualify.
    #[must_use]
    pub const fn requires_override(self) -> bool {
        self.is_terminal() || matches!(self, Self::Unknown)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Diagnosed => write!(f, "Diagnosed"),
            Self::Delivered => write!(f, "Delivered"),
            Self::Abandoned => write!(f, "Abandoned"),
            Self::QuickSale => write!(f, "QuickSale"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// The physical item under repair.
///
/// Technician references are weak: identities only, each set independently.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier
    pub id: DeviceId,
    /// Free-form description (brand, model, accessories)
    pub description: String,
    /// Scannable identity, unset until the device is linked
    pub qr_token: Option<QrToken>,
    /// When the token was last bound
    pub linked_at: Option<DateTime<Utc>>,
    /// Diagnosis text
    pub diagnosis: Option<String>,
    /// Reference to the diagnosis photo
    pub diagnosis_image_ref: Option<String>,
    /// Proforma cost quoted at diagnosis
    pub declared_cost: Money,
    /// Final cost charged
    pub actual_cost: Option<Money>,
    /// Reference to the printed receipt
    pub receipt_document_ref: Option<String>,
    /// Technician who received the device
    pub receiving_technician: Option<TechnicianId>,
    /// Technician who diagnosed it
    pub diagnosing_technician: Option<TechnicianId>,
    /// Technician who handed it back
    pub delivering_technician: Option<TechnicianId>,
}

impl Device {
    /// Creates an unlinked, undiagnosed device
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(),
            description: description.into(),
            qr_token: None,
            linked_at: None,
            diagnosis: None,
            diagnosis_image_ref: None,
            declared_cost: Money::ZERO,
            actual_cost: None,
            receipt_document_ref: None,
            receiving_technician: None,
            diagnosing_technician: None,
            delivering_technician: None,
        }
    }

    /// `true` if `technician` received or diagnosed this device
    #[must_use]
    pub fn handled_by(&self, technician: &TechnicianId) -> bool {
        self.receiving_technician.as_ref() == Some(technician)
            || self.diagnosing_technician.as_ref() == Some(technician)
    }
}

/// One repair request, from intake to closure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: OrderId,
    /// Human-readable ticket code
    pub ticket: Ticket,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Where/how the device is serviced, set when the device is linked
    pub service_type: Option<ServiceType>,
    /// Client the device belongs to
    pub client_id: Option<ClientId>,
    /// Intake timestamp
    pub created_at: DateTime<Utc>,
    /// When the diagnosis was recorded
    pub diagnosed_at: Option<DateTime<Utc>>,
    /// When the order was abandoned
    pub abandoned_at: Option<DateTime<Utc>>,
    /// When the device was handed back
    pub delivered_at: Option<DateTime<Utc>>,
    /// Problem reported by the client
    pub problem_description: String,
    /// Soft-deletion flag
    pub deleted: bool,
    /// The device this order owns
    pub device: Device,
}

impl Order {
    /// `true` if the order takes part in financial and statistical views
    #[must_use]
    pub const fn is_countable(&self) -> bool {
        !self.deleted
    }
}

/// Device shape inside a [`LegacyOrderRecord`]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyDevice {
    /// Device id
    pub id: Option<Uuid>,
    /// Description
    pub description: String,
    /// Raw, possibly unnormalized token
    pub qr_token: Option<String>,
    /// Diagnosis text
    pub diagnosis: Option<String>,
    /// Diagnosis photo
    pub diagnosis_image_ref: Option<String>,
    /// Proforma cost as a decimal number
    pub declared_cost: Option<f64>,
    /// Final cost as a decimal number
    pub actual_cost: Option<f64>,
    /// Receipt reference
    pub receipt_document_ref: Option<String>,
    /// Receiving technician
    pub receiving_technician_id: Option<String>,
    /// Diagnosing technician
    pub diagnosing_technician_id: Option<String>,
    /// Delivering technician
    pub delivering_technician_id: Option<String>,
}

/// Order document as written by the previous application.
///
/// That schema used an `agreedCost` field as a soft-delete marker: any value,
/// even `0`, means the order was deleted. It never held a real price.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOrderRecord {
    /// Order id
    pub id: Uuid,
    /// Ticket code
    pub ticket: String,
    /// Free-text status
    pub status: String,
    /// Free-text service type
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    /// Client id
    #[serde(default)]
    pub client_id: Option<Uuid>,
    /// Intake time
    pub created_at: DateTime<Utc>,
    /// Diagnosis time
    #[serde(default)]
    pub diagnosed_at: Option<DateTime<Utc>>,
    /// Abandonment time
    #[serde(default)]
    pub abandoned_at: Option<DateTime<Utc>>,
    /// Delivery time
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    /// Reported problem
    #[serde(default)]
    pub problem_description: String,
    /// Deletion marker
    #[serde(default)]
    pub agreed_cost: Option<serde_json::Value>,
    /// Owned device
    #[serde(default)]
    pub device: LegacyDevice,
}

impl LegacyOrderRecord {
    /// Decodes a legacy JSON document straight into an [`Order`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] (as an upstream error) if the document
    /// does not match the legacy shape.
    pub fn from_json(document: &str) -> Result<Order> {
        let record: Self = serde_json::from_str(document)
            .map_err(|e| StoreError::Corrupt(format!("legacy order: {e}")))?;
        Ok(record.into())
    }
}

#[allow(clippy::cast_possible_truncation)] // legacy decimals are shop prices, far below i64 range
fn legacy_money(value: f64) -> Money {
    Money::from_cents((value * 100.0).round() as i64)
}

fn legacy_technician(id: Option<String>) -> Option<TechnicianId> {
    id.and_then(|raw| TechnicianId::parse(raw).ok())
}

impl From<LegacyOrderRecord> for Order {
    fn from(record: LegacyOrderRecord) -> Self {
        let legacy = record.device;
        let qr_token = legacy.qr_token.and_then(|raw| QrToken::parse(&raw).ok());
        let device = Device {
            id: legacy.id.map_or_else(DeviceId::new, DeviceId::from_uuid),
            description: legacy.description,
            linked_at: qr_token.as_ref().map(|_| record.created_at),
            qr_token,
            diagnosis: legacy.diagnosis,
            diagnosis_image_ref: legacy.diagnosis_image_ref,
            declared_cost: legacy.declared_cost.map_or(Money::ZERO, legacy_money),
            actual_cost: legacy.actual_cost.map(legacy_money),
            receipt_document_ref: legacy.receipt_document_ref,
            receiving_technician: legacy_technician(legacy.receiving_technician_id),
            diagnosing_technician: legacy_technician(legacy.diagnosing_technician_id),
            delivering_technician: legacy_technician(legacy.delivering_technician_id),
        };

        Self {
            id: OrderId::from_uuid(record.id),
            ticket: Ticket::new(record.ticket),
            status: OrderStatus::from_label(&record.status),
            service_type: record.service_type,
            client_id: record.client_id.map(ClientId::from_uuid),
            created_at: record.created_at,
            diagnosed_at: record.diagnosed_at,
            abandoned_at: record.abandoned_at,
            delivered_at: record.delivered_at,
            problem_description: record.problem_description,
            deleted: record.agreed_cost.is_some(),
            device,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn status_labels_cover_both_languages() {
        assert_eq!(OrderStatus::from_label("Pendiente"), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_label("diagnosed"), OrderStatus::Diagnosed);
        assert_eq!(OrderStatus::from_label("ENTREGADO"), OrderStatus::Delivered);
        assert_eq!(OrderStatus::from_label("venta rapida"), OrderStatus::QuickSale);
        assert_eq!(OrderStatus::from_label("en revisión"), OrderStatus::Unknown);
    }

    #[test]
    fn unknown_status_deserializes_to_fallback() {
        let status: OrderStatus = serde_json::from_str("\"en_camino\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
        let status: OrderStatus = serde_json::from_str("\"entregado\"").unwrap();
        assert_eq!(status, OrderStatus::Delivered);
    }

    #[test]
    fn override_is_needed_for_terminal_and_unknown() {
        assert!(!OrderStatus::Pending.requires_override());
        assert!(!OrderStatus::Diagnosed.requires_override());
        assert!(OrderStatus::Delivered.requires_override());
        assert!(OrderStatus::QuickSale.requires_override());
        assert!(OrderStatus::Unknown.requires_override());
    }

    #[test]
    fn deletion_marker_migrates_to_flag() {
        let document = r#"{
            "id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
            "ticket": "OT-0042",
            "status": "entregado",
            "createdAt": "2025-03-02T15:00:00Z",
            "problemDescription": "No enciende",
            "agreedCost": 0,
            "device": {
                "description": "Moto G8",
                "qrToken": " QR-77 ",
                "declaredCost": 120.5,
                "diagnosingTechnicianId": "tech-9"
            }
        }"#;

        let order = LegacyOrderRecord::from_json(document).unwrap();
        assert!(order.deleted);
        assert!(!order.is_countable());
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.device.qr_token.unwrap().as_str(), "qr-77");
        assert_eq!(order.device.declared_cost, Money::from_cents(12050));
        assert_eq!(
            order.device.diagnosing_technician,
            Some(TechnicianId::parse("tech-9").unwrap())
        );
    }

    #[test]
    fn missing_marker_means_live_order() {
        let document = r#"{
            "id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
            "ticket": "OT-0043",
            "status": "pendiente",
            "createdAt": "2025-03-02T15:00:00Z"
        }"#;

        let order = LegacyOrderRecord::from_json(document).unwrap();
        assert!(!order.deleted);
        assert_eq!(order.device.declared_cost, Money::ZERO);
        assert!(order.device.qr_token.is_none());
    }

    #[test]
    fn malformed_legacy_document_is_corrupt() {
        let err = LegacyOrderRecord::from_json("{\"ticket\": 5}").unwrap_err();
        assert!(matches!(
            err,
            crate::error::RepairError::Upstream(StoreError::Corrupt(_))
        ));
    }
}
