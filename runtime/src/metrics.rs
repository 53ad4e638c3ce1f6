//! Prometheus metrics for the front desk.
//!
//! This module provides metric collection for every service:
//! - Order transitions and rejected commands
//! - Payments by method
//! - Register closures and failed closures
//! - QR resolutions by outcome
//!
//! Recording is always safe: without an installed recorder the `metrics`
//! macros are no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use repairdesk_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//! println!("{}", recorder.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use repairdesk_core::error::{ErrorKind, RepairError};
use repairdesk_core::events::RepairEvent;
use repairdesk_core::ledger::PaymentMethod;
use repairdesk_core::types::Money;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for the process.
///
/// Installs the global recorder once and renders the exposition text on demand.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this logs a
    /// warning and leaves [`render`](Self::render) returning `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this recorder was not the one installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "repairdesk_events_total",
        "State-change events produced, by event type"
    );
    describe_counter!(
        "repairdesk_overrides_total",
        "Transitions that left a terminal or unknown status through an override"
    );
    describe_counter!(
        "repairdesk_commands_rejected_total",
        "Operations that failed, by error kind"
    );
    describe_counter!(
        "repairdesk_payments_total",
        "Payments recorded, by method"
    );
    describe_histogram!(
        "repairdesk_payment_amount_soles",
        "Amount of each recorded payment"
    );
    describe_counter!(
        "repairdesk_closures_total",
        "Register closures recorded"
    );
    describe_counter!(
        "repairdesk_closure_failures_total",
        "Register closures that did not complete, by reason"
    );
    describe_histogram!(
        "repairdesk_closure_duration_seconds",
        "Time taken to close the register"
    );
    describe_counter!(
        "repairdesk_qr_resolutions_total",
        "QR scans resolved, by outcome"
    );
}

/// Order and event metrics recorder.
pub struct DeskMetrics;

impl DeskMetrics {
    /// Record a produced event.
    pub fn record_event(event: &RepairEvent) {
        counter!("repairdesk_events_total", "event" => event.event_type()).increment(1);
        if event.reopened_from().is_some() {
            counter!("repairdesk_overrides_total", "event" => event.event_type()).increment(1);
        }
    }

    /// Record a failed operation.
    pub fn record_rejection(operation: &'static str, error: &RepairError) {
        let kind = match error.kind() {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PartialClose => "partial_close",
            ErrorKind::Upstream => "upstream",
        };
        counter!("repairdesk_commands_rejected_total", "operation" => operation, "kind" => kind)
            .increment(1);
    }
}

/// Payment metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record a payment.
    #[allow(clippy::cast_precision_loss)] // Reporting only
    pub fn record_payment(method: PaymentMethod, amount: Money) {
        let method = method.to_string();
        counter!("repairdesk_payments_total", "method" => method.clone()).increment(1);
        histogram!("repairdesk_payment_amount_soles", "method" => method)
            .record(amount.cents() as f64 / 100.0);
    }
}

/// Closure metrics recorder.
pub struct ClosureMetrics;

impl ClosureMetrics {
    /// Record a completed closure.
    pub fn record_closure(duration: Duration) {
        counter!("repairdesk_closures_total").increment(1);
        histogram!("repairdesk_closure_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a closure that did not complete.
    pub fn record_failure(reason: &'static str) {
        counter!("repairdesk_closure_failures_total", "reason" => reason).increment(1);
    }
}

/// QR resolver metrics recorder.
pub struct ResolverMetrics;

impl ResolverMetrics {
    /// Record a resolution outcome (`new_client` or `returning`).
    pub fn record_resolution(outcome: &'static str) {
        counter!("repairdesk_qr_resolutions_total", "outcome" => outcome).increment(1);
    }
}
