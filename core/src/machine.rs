//! Order state machine.
//!
//! [`OrderReducer`] validates an [`OrderCommand`] against an [`Order`],
//! produces the matching [`RepairEvent`] and applies it. Normal flow:
//!
//! ```text
//! Pending ──RecordDiagnosis──▶ Diagnosed ──Deliver──▶ Delivered
//!    │                            │
//!    ├──Abandon───────────────────┴──────────────────▶ Abandoned
//!    └──QuickSale────────────────────────────────────▶ QuickSale
//! ```
//!
//! Anything outside that table needs an override reason. Leaving a terminal
//! (or unrecognized) status without one fails with
//! [`ValidationError::OverrideRequired`]; any other jump fails with
//! [`ValidationError::IllegalTransition`]. Overridden transitions record the
//! status they left in `reopened_from` and are logged at `warn`.

use crate::environment::{Clock, IdGenerator};
use crate::error::{Result, ValidationError};
use crate::events::RepairEvent;
use crate::order::{Device, Order, OrderStatus};
use crate::reducer::Reducer;
use crate::types::{ActingTechnician, ClientId, Money, QrToken, ServiceType, Ticket};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Rules the operator can tune per shop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderPolicy {
    /// Prefix of generated ticket codes
    pub ticket_prefix: String,
    /// Block `Deliver` until at least one payment exists
    pub require_payment_for_delivery: bool,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            ticket_prefix: "OT".to_string(),
            require_payment_for_delivery: false,
        }
    }
}

/// Environment for the order state machine
#[derive(Clone)]
pub struct OrderEnvironment {
    /// Clock for transition timestamps
    pub clock: Arc<dyn Clock>,
    /// Identifiers for new orders and devices
    pub ids: Arc<dyn IdGenerator>,
    /// Shop rules
    pub policy: OrderPolicy,
}

impl OrderEnvironment {
    /// Creates a new order environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>, policy: OrderPolicy) -> Self {
        Self { clock, ids, policy }
    }
}

/// Data captured at the counter when a device comes in
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderIntake {
    /// Problem as the client describes it
    pub problem_description: String,
    /// Brand, model and accessories
    pub device_description: String,
    /// Owner, when already registered
    pub client_id: Option<ClientId>,
}

/// Commands accepted by [`OrderReducer`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderCommand {
    /// Bind a QR token to the device. Allowed in any status; the last link wins.
    LinkDevice {
        /// Normalized token
        token: QrToken,
        /// Where the device will be serviced
        service_type: ServiceType,
        /// Receiving technician
        technician: ActingTechnician,
    },
    /// `Pending → Diagnosed`
    RecordDiagnosis {
        /// Diagnosis text, must not be blank
        diagnosis: String,
        /// Diagnosis photo
        image_ref: Option<String>,
        /// Proforma cost; missing means zero
        declared_cost: Option<Money>,
        /// Diagnosing technician
        technician: ActingTechnician,
        /// Reason for leaving a status outside the normal flow
        override_reason: Option<String>,
    },
    /// `Diagnosed → Delivered`
    Deliver {
        /// Delivering technician
        technician: ActingTechnician,
        /// Final cost charged, if settled now
        final_cost: Option<Money>,
        /// Sum of payments already recorded for the order
        payments_on_file: Money,
        /// Reason for leaving a status outside the normal flow
        override_reason: Option<String>,
    },
    /// `Pending | Diagnosed → Abandoned`
    Abandon {
        /// When the order was given up
        abandoned_at: DateTime<Utc>,
        /// Reason for leaving a status outside the normal flow
        override_reason: Option<String>,
    },
    /// `Pending → QuickSale`
    QuickSale {
        /// Technician making the sale
        technician: ActingTechnician,
        /// Reason for leaving a status outside the normal flow
        override_reason: Option<String>,
    },
    /// Soft-delete the order
    MarkDeleted,
    /// Undo a soft deletion
    Restore,
    /// Record the reference of a printed receipt
    AttachReceipt {
        /// Document reference returned by the generator
        reference: String,
    },
}

impl OrderCommand {
    /// Short name used in errors and logs
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::LinkDevice { .. } => "link device",
            Self::RecordDiagnosis { .. } => "diagnose",
            Self::Deliver { .. } => "deliver",
            Self::Abandon { .. } => "abandon",
            Self::QuickSale { .. } => "quick-sell",
            Self::MarkDeleted => "delete",
            Self::Restore => "restore",
            Self::AttachReceipt { .. } => "attach a receipt to",
        }
    }
}

/// Reducer implementing the repair order lifecycle
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderReducer;

impl OrderReducer {
    /// Creates a new order reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Takes in a new order with a fresh, unlinked device.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyProblemDescription`] if the problem
    /// description is blank.
    pub fn open(intake: OrderIntake, env: &OrderEnvironment) -> Result<(Order, RepairEvent)> {
        let problem_description = intake.problem_description.trim().to_string();
        if problem_description.is_empty() {
            tracing::warn!("Intake rejected: empty problem description");
            return Err(ValidationError::EmptyProblemDescription.into());
        }

        let order_id = env.ids.order_id();
        let device_id = env.ids.device_id();
        let event = RepairEvent::OrderOpened {
            order_id,
            ticket: Ticket::for_order(&env.policy.ticket_prefix, &order_id),
            device_id,
            client_id: intake.client_id,
            problem_description,
            device_description: intake.device_description.trim().to_string(),
            opened_at: env.clock.now(),
        };

        let mut order = Order {
            id: order_id,
            ticket: Ticket::new(String::new()),
            status: OrderStatus::Pending,
            service_type: None,
            client_id: None,
            created_at: env.clock.now(),
            diagnosed_at: None,
            abandoned_at: None,
            delivered_at: None,
            problem_description: String::new(),
            deleted: false,
            device: Device::new(String::new()),
        };
        Self::apply_event(&mut order, &event);
        Ok((order, event))
    }

    /// Applies an event to an order (for event replay)
    pub fn apply_event(order: &mut Order, event: &RepairEvent) {
        match event {
            RepairEvent::OrderOpened {
                order_id,
                ticket,
                device_id,
                client_id,
                problem_description,
                device_description,
                opened_at,
            } => {
                order.id = *order_id;
                order.ticket = ticket.clone();
                order.status = OrderStatus::Pending;
                order.client_id = *client_id;
                order.created_at = *opened_at;
                order.problem_description.clone_from(problem_description);
                order.device = Device::new(device_description.clone());
                order.device.id = *device_id;
            },
            RepairEvent::DeviceLinked {
                token,
                service_type,
                technician,
                linked_at,
                ..
            } => {
                order.service_type = Some(*service_type);
                order.device.qr_token = Some(token.clone());
                order.device.linked_at = Some(*linked_at);
                order.device.receiving_technician = Some(technician.clone());
            },
            RepairEvent::DiagnosisRecorded {
                diagnosis,
                image_ref,
                declared_cost,
                technician,
                diagnosed_at,
                ..
            } => {
                order.status = OrderStatus::Diagnosed;
                order.diagnosed_at = Some(*diagnosed_at);
                order.device.diagnosis = Some(diagnosis.clone());
                order.device.diagnosis_image_ref.clone_from(image_ref);
                order.device.declared_cost = *declared_cost;
                order.device.diagnosing_technician = Some(technician.clone());
            },
            RepairEvent::OrderDelivered {
                final_cost,
                technician,
                delivered_at,
                ..
            } => {
                order.status = OrderStatus::Delivered;
                order.delivered_at = Some(*delivered_at);
                if let Some(cost) = final_cost {
                    order.device.actual_cost = Some(*cost);
                }
                order.device.delivering_technician = Some(technician.clone());
            },
            RepairEvent::OrderAbandoned { abandoned_at, .. } => {
                order.status = OrderStatus::Abandoned;
                order.abandoned_at = Some(*abandoned_at);
            },
            RepairEvent::QuickSaleCompleted {
                technician,
                delivered_at,
                ..
            } => {
                order.status = OrderStatus::QuickSale;
                order.delivered_at = Some(*delivered_at);
                order.device.delivering_technician = Some(technician.clone());
            },
            RepairEvent::OrderDeleted { .. } => order.deleted = true,
            RepairEvent::OrderRestored { .. } => order.deleted = false,
            RepairEvent::ReceiptAttached { reference, .. } => {
                order.device.receipt_document_ref = Some(reference.clone());
            },
            // Ledger and register events do not touch the order itself
            RepairEvent::PaymentRecorded { .. } | RepairEvent::RegisterClosed { .. } => {},
        }
    }

    /// Checks a status change against the normal-flow table.
    ///
    /// Returns the status being overridden, or `None` for a normal transition.
    fn validate_transition(
        order: &Order,
        allowed_from: &[OrderStatus],
        action: &'static str,
        override_reason: Option<&str>,
    ) -> Result<Option<OrderStatus>> {
        if allowed_from.contains(&order.status) {
            return Ok(None);
        }

        let has_reason = override_reason.is_some_and(|reason| !reason.trim().is_empty());
        if has_reason {
            tracing::warn!(
                order_id = %order.id,
                from = %order.status,
                action,
                reason = override_reason.unwrap_or_default(),
                "Administrative override"
            );
            return Ok(Some(order.status));
        }

        let from = order.status.to_string();
        if order.status.requires_override() {
            Err(ValidationError::OverrideRequired { from, action }.into())
        } else {
            Err(ValidationError::IllegalTransition { from, action }.into())
        }
    }

    /// Validates a `RecordDiagnosis` command, returning the cleaned text and cost
    fn validate_diagnosis(diagnosis: &str, declared_cost: Option<Money>) -> Result<(String, Money)> {
        let diagnosis = diagnosis.trim();
        if diagnosis.is_empty() {
            return Err(ValidationError::EmptyDiagnosis.into());
        }
        let cost = declared_cost.unwrap_or(Money::ZERO);
        if cost.cents() < 0 {
            return Err(ValidationError::NegativeCost {
                cents: cost.cents(),
            }
            .into());
        }
        Ok((diagnosis.to_string(), cost))
    }

    /// Validates the cost and payment guards of a `Deliver` command
    fn validate_delivery(
        order: &Order,
        final_cost: Option<Money>,
        payments_on_file: Money,
        policy: &OrderPolicy,
    ) -> Result<()> {
        if let Some(cost) = final_cost {
            if cost.cents() < 0 {
                return Err(ValidationError::NegativeCost {
                    cents: cost.cents(),
                }
                .into());
            }
        }
        if policy.require_payment_for_delivery && !payments_on_file.is_positive() {
            return Err(ValidationError::PaymentRequired(order.id).into());
        }
        Ok(())
    }

    fn decide(order: &Order, command: OrderCommand, env: &OrderEnvironment) -> Result<RepairEvent> {
        let order_id = order.id;
        let now = env.clock.now();

        if order.deleted && !matches!(command, OrderCommand::Restore) {
            return Err(ValidationError::OrderDeleted(order_id).into());
        }

        let action = command.action();
        let event = match command {
            OrderCommand::LinkDevice {
                token,
                service_type,
                technician,
            } => RepairEvent::DeviceLinked {
                order_id,
                device_id: order.device.id,
                replaced: order.device.qr_token.clone().filter(|old| old != &token),
                token,
                service_type,
                technician: technician.id,
                linked_at: now,
            },

            OrderCommand::RecordDiagnosis {
                diagnosis,
                image_ref,
                declared_cost,
                technician,
                override_reason,
            } => {
                let (diagnosis, declared_cost) = Self::validate_diagnosis(&diagnosis, declared_cost)?;
                let reopened_from = Self::validate_transition(
                    order,
                    &[OrderStatus::Pending, OrderStatus::Diagnosed],
                    action,
                    override_reason.as_deref(),
                )?;
                RepairEvent::DiagnosisRecorded {
                    order_id,
                    diagnosis,
                    image_ref,
                    declared_cost,
                    technician: technician.id,
                    reopened_from,
                    diagnosed_at: now,
                }
            },

            OrderCommand::Deliver {
                technician,
                final_cost,
                payments_on_file,
                override_reason,
            } => {
                let reopened_from = Self::validate_transition(
                    order,
                    &[OrderStatus::Diagnosed],
                    action,
                    override_reason.as_deref(),
                )?;
                Self::validate_delivery(order, final_cost, payments_on_file, &env.policy)?;
                RepairEvent::OrderDelivered {
                    order_id,
                    final_cost,
                    technician: technician.id,
                    reopened_from,
                    delivered_at: now,
                }
            },

            OrderCommand::Abandon {
                abandoned_at,
                override_reason,
            } => {
                let reopened_from = Self::validate_transition(
                    order,
                    &[OrderStatus::Pending, OrderStatus::Diagnosed],
                    action,
                    override_reason.as_deref(),
                )?;
                RepairEvent::OrderAbandoned {
                    order_id,
                    reopened_from,
                    abandoned_at,
                }
            },

            OrderCommand::QuickSale {
                technician,
                override_reason,
            } => {
                let reopened_from = Self::validate_transition(
                    order,
                    &[OrderStatus::Pending],
                    action,
                    override_reason.as_deref(),
                )?;
                RepairEvent::QuickSaleCompleted {
                    order_id,
                    technician: technician.id,
                    reopened_from,
                    delivered_at: now,
                }
            },

            OrderCommand::MarkDeleted => RepairEvent::OrderDeleted {
                order_id,
                deleted_at: now,
            },

            OrderCommand::Restore => {
                if !order.deleted {
                    return Err(ValidationError::IllegalTransition {
                        from: order.status.to_string(),
                        action,
                    }
                    .into());
                }
                RepairEvent::OrderRestored {
                    order_id,
                    restored_at: now,
                }
            },

            OrderCommand::AttachReceipt { reference } => RepairEvent::ReceiptAttached {
                order_id,
                reference,
            },
        };
        Ok(event)
    }
}

impl Reducer for OrderReducer {
    type State = Order;
    type Action = OrderCommand;
    type Event = RepairEvent;
    type Environment = OrderEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Self::Event> {
        let name = action.action();
        match Self::decide(state, action, env) {
            Ok(event) => {
                Self::apply_event(state, &event);
                tracing::debug!(
                    order_id = %state.id,
                    event = event.event_type(),
                    status = %state.status,
                    "Order transition applied"
                );
                Ok(event)
            },
            Err(error) => {
                tracing::warn!(order_id = %state.id, action = name, %error, "Order command rejected");
                Err(error)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::environment::RandomIds;
    use crate::error::RepairError;
    use crate::types::TechnicianId;
    use chrono::TimeZone;

    struct TestClock(DateTime<Utc>);

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap()
    }

    fn env_with(policy: OrderPolicy) -> OrderEnvironment {
        OrderEnvironment::new(Arc::new(TestClock(t0())), Arc::new(RandomIds), policy)
    }

    fn env() -> OrderEnvironment {
        env_with(OrderPolicy::default())
    }

    fn tech(id: &str) -> ActingTechnician {
        ActingTechnician::new(id, id.to_uppercase()).unwrap()
    }

    fn pending() -> Order {
        let intake = OrderIntake {
            problem_description: "  Pantalla rota ".into(),
            device_description: "Samsung A52".into(),
            client_id: None,
        };
        OrderReducer::open(intake, &env()).unwrap().0
    }

    fn diagnose(order: &mut Order) {
        OrderReducer
            .reduce(
                order,
                OrderCommand::RecordDiagnosis {
                    diagnosis: "Cambio de pantalla".into(),
                    image_ref: None,
                    declared_cost: Some(Money::from_soles(150)),
                    technician: tech("tech-1"),
                    override_reason: None,
                },
                &env(),
            )
            .unwrap();
    }

    fn deliver(override_reason: Option<&str>) -> OrderCommand {
        OrderCommand::Deliver {
            technician: tech("tech-2"),
            final_cost: None,
            payments_on_file: Money::ZERO,
            override_reason: override_reason.map(str::to_string),
        }
    }

    #[test]
    fn open_creates_pending_order_with_ticket() {
        let (order, event) = OrderReducer::open(
            OrderIntake {
                problem_description: "No enciende".into(),
                device_description: "iPhone 11".into(),
                client_id: None,
            },
            &env(),
        )
        .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, t0());
        assert!(order.ticket.as_str().starts_with("OT-"));
        assert_eq!(order.ticket.as_str().len(), 11);
        assert_eq!(order.device.description, "iPhone 11");
        assert!(order.device.qr_token.is_none());
        assert_eq!(event.order_id(), Some(order.id));
    }

    #[test]
    fn open_rejects_blank_problem() {
        let err = OrderReducer::open(
            OrderIntake {
                problem_description: "   ".into(),
                device_description: "Laptop".into(),
                client_id: None,
            },
            &env(),
        )
        .unwrap_err();
        assert_eq!(err, RepairError::from(ValidationError::EmptyProblemDescription));
    }

    #[test]
    fn diagnosis_stamps_time_technician_and_cost() {
        let mut order = pending();
        diagnose(&mut order);

        assert_eq!(order.status, OrderStatus::Diagnosed);
        assert_eq!(order.diagnosed_at, Some(t0()));
        assert_eq!(
            order.device.diagnosing_technician,
            Some(TechnicianId::parse("tech-1").unwrap())
        );
        assert_eq!(order.device.declared_cost, Money::from_soles(150));
    }

    #[test]
    fn missing_declared_cost_defaults_to_zero() {
        let mut order = pending();
        OrderReducer
            .reduce(
                &mut order,
                OrderCommand::RecordDiagnosis {
                    diagnosis: "Limpieza".into(),
                    image_ref: Some("img/1.jpg".into()),
                    declared_cost: None,
                    technician: tech("tech-1"),
                    override_reason: None,
                },
                &env(),
            )
            .unwrap();
        assert_eq!(order.device.declared_cost, Money::ZERO);
        assert_eq!(order.device.diagnosis_image_ref.as_deref(), Some("img/1.jpg"));
    }

    #[test]
    fn empty_diagnosis_leaves_state_unchanged() {
        let mut order = pending();
        let before = order.clone();
        let err = OrderReducer
            .reduce(
                &mut order,
                OrderCommand::RecordDiagnosis {
                    diagnosis: " \n ".into(),
                    image_ref: None,
                    declared_cost: None,
                    technician: tech("tech-1"),
                    override_reason: None,
                },
                &env(),
            )
            .unwrap_err();
        assert_eq!(err, RepairError::from(ValidationError::EmptyDiagnosis));
        assert_eq!(order, before);
    }

    #[test]
    fn deliver_after_diagnosis() {
        let mut order = pending();
        diagnose(&mut order);
        let event = OrderReducer.reduce(&mut order, deliver(None), &env()).unwrap();

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.delivered_at, Some(t0()));
        assert_eq!(
            order.device.delivering_technician,
            Some(TechnicianId::parse("tech-2").unwrap())
        );
        assert_eq!(event.reopened_from(), None);
    }

    #[test]
    fn deliver_from_pending_is_illegal_without_override() {
        let mut order = pending();
        let err = OrderReducer.reduce(&mut order, deliver(None), &env()).unwrap_err();
        assert!(matches!(
            err,
            RepairError::Validation(ValidationError::IllegalTransition { action: "deliver", .. })
        ));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn payment_gate_is_advisory_by_default() {
        let mut order = pending();
        diagnose(&mut order);
        assert!(OrderReducer.reduce(&mut order, deliver(None), &env()).is_ok());
    }

    #[test]
    fn payment_gate_blocks_when_required() {
        let strict = env_with(OrderPolicy {
            require_payment_for_delivery: true,
            ..OrderPolicy::default()
        });
        let mut order = pending();
        diagnose(&mut order);

        let err = OrderReducer.reduce(&mut order, deliver(None), &strict).unwrap_err();
        assert_eq!(err, RepairError::from(ValidationError::PaymentRequired(order.id)));

        let paid = OrderCommand::Deliver {
            technician: tech("tech-2"),
            final_cost: Some(Money::from_soles(150)),
            payments_on_file: Money::from_soles(50),
            override_reason: None,
        };
        OrderReducer.reduce(&mut order, paid, &strict).unwrap();
        assert_eq!(order.device.actual_cost, Some(Money::from_soles(150)));
    }

    #[test]
    fn leaving_terminal_state_requires_override() {
        let mut order = pending();
        diagnose(&mut order);
        OrderReducer.reduce(&mut order, deliver(None), &env()).unwrap();

        let abandon = |reason: Option<&str>| OrderCommand::Abandon {
            abandoned_at: t0(),
            override_reason: reason.map(str::to_string),
        };

        let err = OrderReducer.reduce(&mut order, abandon(None), &env()).unwrap_err();
        assert!(matches!(
            err,
            RepairError::Validation(ValidationError::OverrideRequired { .. })
        ));
        let err = OrderReducer.reduce(&mut order, abandon(Some("  ")), &env()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let event = OrderReducer
            .reduce(&mut order, abandon(Some("wrong button")), &env())
            .unwrap();
        assert_eq!(order.status, OrderStatus::Abandoned);
        assert_eq!(event.reopened_from(), Some(OrderStatus::Delivered));
    }

    #[test]
    fn quick_sale_only_from_pending() {
        let mut order = pending();
        let event = OrderReducer
            .reduce(
                &mut order,
                OrderCommand::QuickSale {
                    technician: tech("tech-3"),
                    override_reason: None,
                },
                &env(),
            )
            .unwrap();
        assert_eq!(order.status, OrderStatus::QuickSale);
        assert_eq!(order.delivered_at, Some(t0()));
        assert_eq!(event.event_type(), "quick_sale_completed");

        let mut diagnosed = pending();
        diagnose(&mut diagnosed);
        let err = OrderReducer
            .reduce(
                &mut diagnosed,
                OrderCommand::QuickSale {
                    technician: tech("tech-3"),
                    override_reason: None,
                },
                &env(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RepairError::Validation(ValidationError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn link_device_is_last_write_wins() {
        let mut order = pending();
        let link = |raw: &str| OrderCommand::LinkDevice {
            token: QrToken::parse(raw).unwrap(),
            service_type: ServiceType::Workshop,
            technician: tech("tech-1"),
        };

        OrderReducer.reduce(&mut order, link("QR-1"), &env()).unwrap();
        diagnose(&mut order);
        let event = OrderReducer.reduce(&mut order, link("QR-2"), &env()).unwrap();

        assert_eq!(order.device.qr_token.as_ref().unwrap().as_str(), "qr-2");
        assert_eq!(order.status, OrderStatus::Diagnosed);
        assert_eq!(order.service_type, Some(ServiceType::Workshop));
        assert!(matches!(
            event,
            RepairEvent::DeviceLinked { replaced: Some(ref old), .. } if old.as_str() == "qr-1"
        ));
    }

    #[test]
    fn deleted_order_rejects_everything_but_restore() {
        let mut order = pending();
        OrderReducer.reduce(&mut order, OrderCommand::MarkDeleted, &env()).unwrap();
        assert!(order.deleted);

        let err = OrderReducer
            .reduce(
                &mut order,
                OrderCommand::AttachReceipt {
                    reference: "doc-1".into(),
                },
                &env(),
            )
            .unwrap_err();
        assert_eq!(err, RepairError::from(ValidationError::OrderDeleted(order.id)));

        OrderReducer.reduce(&mut order, OrderCommand::Restore, &env()).unwrap();
        assert!(!order.deleted);
        assert!(OrderReducer.reduce(&mut order, OrderCommand::Restore, &env()).is_err());
    }

    #[test]
    fn unknown_status_needs_override() {
        let mut order = pending();
        order.status = OrderStatus::Unknown;
        let err = OrderReducer.reduce(&mut order, deliver(None), &env()).unwrap_err();
        assert!(matches!(
            err,
            RepairError::Validation(ValidationError::OverrideRequired { .. })
        ));
        OrderReducer
            .reduce(&mut order, deliver(Some("legacy cleanup")), &env())
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
    }
}
