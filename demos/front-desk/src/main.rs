//! Front Desk Demo
//!
//! Walks one device through the shop against in-memory backends: intake,
//! QR link, diagnosis, checkout, receipt, a returning scan, the technician
//! report and the end-of-day register closure.
//!
//! # Running the Example
//!
//! ```bash
//! RUST_LOG=debug cargo run -p front-desk-demo
//! ```
//!
//! Every `REPAIRDESK_*` variable described in `DeskConfig::from_env` applies.

#![allow(missing_docs)]

use repairdesk_core::closure::UnclearedFilter;
use repairdesk_core::environment::{RandomIds, SystemClock};
use repairdesk_core::ledger::PaymentMethod;
use repairdesk_core::machine::OrderIntake;
use repairdesk_core::types::{ActingTechnician, Money, Period, ServiceType};
use repairdesk_runtime::{Backends, DeskConfig, Diagnosis, FrontDesk, MetricsRecorder};
use repairdesk_testing::mocks::{
    InMemoryClosureStore, InMemoryDeviceRegistry, InMemoryOrderStore, InMemoryPaymentStore,
    StubDocumentGenerator,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DeskConfig::from_env();

    // 1. Logging and metrics
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.log_level)?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut recorder = MetricsRecorder::new();
    recorder.install()?;

    // 2. Desk over in-memory backends
    let desk = FrontDesk::new(
        config,
        Backends {
            orders: Arc::new(InMemoryOrderStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
            closures: Arc::new(InMemoryClosureStore::new()),
            registry: Arc::new(InMemoryDeviceRegistry::new()),
            documents: Arc::new(StubDocumentGenerator::new()),
        },
        Arc::new(SystemClock),
        Arc::new(RandomIds),
    );
    let mut events = desk.subscribe();

    let counter = ActingTechnician::new("tec-01", "Rosa")?;
    let bench = ActingTechnician::new("tec-02", "Jorge")?;

    // 3. First visit
    let client = desk
        .register_client("María Huamán", Some("987 654 321".to_string()), None)
        .await?;
    let order = desk
        .orders()
        .open_order(OrderIntake {
            problem_description: "No carga".to_string(),
            device_description: "Xiaomi Redmi Note 10, sin cargador".to_string(),
            client_id: Some(client.id),
        })
        .await?;
    tracing::info!(ticket = %order.ticket, "Ticket issued");

    let scan = " QR-0042 ";
    let first_look = desk.resolver().resolve(scan).await?;
    tracing::info!(returning = first_look.is_returning(), "First scan");

    desk.orders()
        .link_device(order.id, scan, ServiceType::Workshop, &counter)
        .await?;
    desk.orders()
        .record_diagnosis(
            order.id,
            Diagnosis::new("Pin de carga dañado").with_cost(Money::parse("80")?),
            &bench,
            None,
        )
        .await?;

    let checkout = desk
        .checkout(order.id, Money::parse("50")?, PaymentMethod::Cash, &counter)
        .await?;
    tracing::info!(payment = %checkout.payment.amount, delivered = ?checkout.delivery.as_ref().map(Result::is_ok), "Checkout");
    desk.ledger()
        .record_payment(order.id, Money::parse("30")?, PaymentMethod::Yape, checkout.payment.paid_at, &counter)
        .await?;

    let receipt = desk.issue_receipt(order.id, &counter).await?;
    tracing::info!(reference = ?receipt.device.receipt_document_ref, "Receipt issued");

    // 4. The same phone comes back
    let again = desk.resolver().resolve("qr-0042").await?;
    if let Some(current) = again.current() {
        tracing::info!(
            ticket = %current.ticket,
            diagnosis = ?current.device.diagnosis,
            client = ?current.client.as_ref().map(|c| c.name.as_str()),
            visits = again.history().len(),
            "Returning device"
        );
    }

    // 5. Reports and closure
    let report = desk.stats().report(Period::AllTime, &[]).await?;
    for entry in &report.entries {
        tracing::info!(
            technician = %entry.technician,
            diagnosed = entry.diagnosed_count,
            revenue = %entry.revenue,
            share = entry.share_percent,
            "Technician"
        );
    }

    let preview = desk
        .register()
        .compute_uncleared(&UnclearedFilter::default())
        .await?;
    tracing::info!(cash = %preview.cash_total, electronic = %preview.electronic_total, "Register preview");

    let closure = desk
        .register()
        .close_register(Money::parse("78.50")?, &counter)
        .await?;
    tracing::info!(
        closure_id = %closure.id,
        ledger = %closure.grand_total(),
        counted = %closure.declared_total,
        discrepancy = %closure.discrepancy(),
        "Register closed"
    );

    while let Ok(event) = events.try_recv() {
        tracing::debug!(event = event.event_type(), order_id = ?event.order_id(), "Event");
    }

    if let Some(rendered) = recorder.render() {
        println!("{rendered}");
    }
    Ok(())
}
