//! Configuration for the front desk.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparseable values fall back to the default.

use chrono::{FixedOffset, Offset, Utc};
use repairdesk_core::machine::OrderPolicy;
use serde::{Deserialize, Serialize};
use std::env;

/// Front desk configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskConfig {
    /// Prefix of human-readable ticket codes (default: `OT`)
    pub ticket_prefix: String,
    /// Shop-local offset from UTC in minutes, used for report buckets (default: -300, Lima)
    pub utc_offset_minutes: i32,
    /// Refuse delivery until the order has a recorded payment (default: false)
    pub require_payment_for_delivery: bool,
    /// Deliver the order right after a checkout payment (default: true)
    pub deliver_on_payment: bool,
    /// Default page size for closure history (default: 20)
    pub closure_page_size: usize,
    /// Capacity of the state-change broadcast channel (default: 64)
    pub event_capacity: usize,
    /// Log filter directive for binaries (default: `info`)
    pub log_level: String,
}

impl DeskConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `REPAIRDESK_TICKET_PREFIX` | `ticket_prefix` |
    /// | `REPAIRDESK_UTC_OFFSET_MINUTES` | `utc_offset_minutes` |
    /// | `REPAIRDESK_REQUIRE_PAYMENT_FOR_DELIVERY` | `require_payment_for_delivery` |
    /// | `REPAIRDESK_DELIVER_ON_PAYMENT` | `deliver_on_payment` |
    /// | `REPAIRDESK_CLOSURE_PAGE_SIZE` | `closure_page_size` |
    /// | `REPAIRDESK_EVENT_CAPACITY` | `event_capacity` |
    /// | `RUST_LOG` | `log_level` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            ticket_prefix: lookup("REPAIRDESK_TICKET_PREFIX")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.ticket_prefix),
            utc_offset_minutes: lookup("REPAIRDESK_UTC_OFFSET_MINUTES")
                .and_then(|s| s.trim().parse().ok())
                .filter(|minutes: &i32| minutes.abs() < 24 * 60)
                .unwrap_or(defaults.utc_offset_minutes),
            require_payment_for_delivery: lookup("REPAIRDESK_REQUIRE_PAYMENT_FOR_DELIVERY")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.require_payment_for_delivery),
            deliver_on_payment: lookup("REPAIRDESK_DELIVER_ON_PAYMENT")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.deliver_on_payment),
            closure_page_size: lookup("REPAIRDESK_CLOSURE_PAGE_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.closure_page_size),
            event_capacity: lookup("REPAIRDESK_EVENT_CAPACITY")
                .and_then(|s| s.trim().parse().ok())
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.event_capacity),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Set the ticket prefix.
    #[must_use]
    pub fn with_ticket_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ticket_prefix = prefix.into();
        self
    }

    /// Set the shop-local UTC offset.
    #[must_use]
    pub const fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Require a payment before delivery.
    #[must_use]
    pub const fn with_require_payment_for_delivery(mut self, required: bool) -> Self {
        self.require_payment_for_delivery = required;
        self
    }

    /// Deliver automatically on checkout.
    #[must_use]
    pub const fn with_deliver_on_payment(mut self, deliver: bool) -> Self {
        self.deliver_on_payment = deliver;
        self
    }

    /// Set the closure history page size.
    #[must_use]
    pub const fn with_closure_page_size(mut self, size: usize) -> Self {
        self.closure_page_size = size;
        self
    }

    /// Set the broadcast channel capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Shop-local offset. Out-of-range values fall back to UTC.
    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Transition rules derived from this configuration.
    #[must_use]
    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            ticket_prefix: self.ticket_prefix.clone(),
            require_payment_for_delivery: self.require_payment_for_delivery,
        }
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            ticket_prefix: "OT".to_string(),
            utc_offset_minutes: -300,
            require_payment_for_delivery: false,
            deliver_on_payment: true,
            closure_page_size: 20,
            event_capacity: 64,
            log_level: "info".to_string(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
