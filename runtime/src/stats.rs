//! Technician aggregation.
//!
//! Statistics are recomputed from the stores on every call. Revenue is
//! attributed to the technician who diagnosed the order.

use chrono::FixedOffset;
use repairdesk_core::error::Result;
use repairdesk_core::ledger::PaymentQuery;
use repairdesk_core::providers::{OrderQuery, OrderStore, PaymentStore};
use repairdesk_core::types::{Money, OrderId, Period, TechnicianId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Figures for one technician
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TechnicianStat {
    /// Technician
    pub technician: TechnicianId,
    /// Live orders diagnosed in the period
    pub diagnosed_count: usize,
    /// Payments received on those orders
    pub revenue: Money,
    /// Share of the report's total revenue, 0 to 100
    pub share_percent: f64,
}

/// Statistics for a set of technicians over one period
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TechnicianReport {
    /// Period covered
    pub period: Period,
    /// One entry per technician
    pub entries: Vec<TechnicianStat>,
    /// Revenue across every entry
    pub total_revenue: Money,
}

impl TechnicianReport {
    /// Entry of one technician
    #[must_use]
    pub fn entry(&self, technician: &TechnicianId) -> Option<&TechnicianStat> {
        self.entries.iter().find(|e| &e.technician == technician)
    }
}

/// Read-side statistics over orders and payments
pub struct TechnicianStats<O, P> {
    orders: Arc<O>,
    payments: Arc<P>,
    offset: FixedOffset,
}

impl<O, P> Clone for TechnicianStats<O, P> {
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
            payments: Arc::clone(&self.payments),
            offset: self.offset,
        }
    }
}

impl<O, P> TechnicianStats<O, P>
where
    O: OrderStore,
    P: PaymentStore,
{
    /// Creates a new aggregator. Periods are evaluated at `offset`.
    #[must_use]
    pub const fn new(orders: Arc<O>, payments: Arc<P>, offset: FixedOffset) -> Self {
        Self {
            orders,
            payments,
            offset,
        }
    }

    /// Build a report for `technicians` over `period`.
    ///
    /// Only non-deleted orders created inside the period count. Each listed
    /// technician gets an entry, zeroed if they diagnosed nothing. An empty
    /// list reports every technician who diagnosed an order in the period.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if a store fails.
    pub async fn report(&self, period: Period, technicians: &[TechnicianId]) -> Result<TechnicianReport> {
        let orders = self.orders.list_orders(&OrderQuery::default()).await?;
        let mut diagnosed: BTreeMap<TechnicianId, BTreeSet<OrderId>> = BTreeMap::new();
        for order in orders
            .iter()
            .filter(|o| o.is_countable() && period.contains(o.created_at, self.offset))
        {
            if let Some(tech) = &order.device.diagnosing_technician {
                diagnosed.entry(tech.clone()).or_default().insert(order.id);
            }
        }

        let wanted: Vec<TechnicianId> = if technicians.is_empty() {
            diagnosed.keys().cloned().collect()
        } else {
            let mut seen = BTreeSet::new();
            technicians
                .iter()
                .filter(|t| seen.insert((*t).clone()))
                .cloned()
                .collect()
        };

        let revenue_by_order = self.revenue_by_order().await?;
        let mut entries: Vec<TechnicianStat> = wanted
            .into_iter()
            .map(|technician| {
                let orders = diagnosed.get(&technician);
                let revenue = orders
                    .into_iter()
                    .flatten()
                    .filter_map(|id| revenue_by_order.get(id))
                    .copied()
                    .sum();
                TechnicianStat {
                    diagnosed_count: orders.map_or(0, BTreeSet::len),
                    revenue,
                    share_percent: 0.0,
                    technician,
                }
            })
            .collect();

        let total_revenue: Money = entries.iter().map(|e| e.revenue).sum();
        for entry in &mut entries {
            entry.share_percent = entry.revenue.percent_of(total_revenue);
        }

        tracing::debug!(
            ?period,
            technicians = entries.len(),
            total_revenue = %total_revenue,
            "Technician report computed"
        );
        Ok(TechnicianReport {
            period,
            entries,
            total_revenue,
        })
    }

    /// Figures for a single technician. The share is 100 when they have any revenue.
    ///
    /// # Errors
    ///
    /// Returns an upstream error if a store fails.
    pub async fn for_technician(&self, period: Period, technician: &TechnicianId) -> Result<TechnicianStat> {
        let mut report = self.report(period, std::slice::from_ref(technician)).await?;
        Ok(report.entries.pop().unwrap_or_else(|| TechnicianStat {
            technician: technician.clone(),
            diagnosed_count: 0,
            revenue: Money::ZERO,
            share_percent: 0.0,
        }))
    }

    async fn revenue_by_order(&self) -> Result<HashMap<OrderId, Money>> {
        let payments = self.payments.list_payments(&PaymentQuery::default()).await?;
        let mut totals: HashMap<OrderId, Money> = HashMap::new();
        for payment in payments {
            *totals.entry(payment.order_id).or_default() += payment.amount;
        }
        Ok(totals)
    }
}
