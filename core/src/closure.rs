//! Register closures and the reconciliation summary they are built from.

use crate::error::{Result, ValidationError};
use crate::ledger::{Payment, PaymentMethod};
use crate::types::{ClosureId, DateRange, Money, OrderId, PaymentId, TechnicianId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable snapshot reconciling every payment that was uncleared when it was taken.
///
/// `declared_total` is what the technician counted; it is recorded next to
/// the ledger totals and never checked against them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashClosure {
    /// Closure identifier
    pub id: ClosureId,
    /// When the register was closed
    pub created_at: DateTime<Utc>,
    /// Amount physically counted
    pub declared_total: Money,
    /// Cash payments reconciled
    pub cash_total: Money,
    /// Non-cash payments reconciled
    pub electronic_total: Money,
    /// Technician who closed the register
    pub technician_id: TechnicianId,
    /// Number of payments consumed
    pub payment_count: usize,
}

impl CashClosure {
    /// Ledger total of the closure
    #[must_use]
    pub fn grand_total(&self) -> Money {
        self.cash_total + self.electronic_total
    }

    /// Counted minus ledger total. Positive means the drawer holds more than recorded.
    #[must_use]
    pub fn discrepancy(&self) -> Money {
        self.declared_total - self.grand_total()
    }
}

/// Restricts which uncleared payments are reconciled or previewed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnclearedFilter {
    /// Only payments whose order was received or diagnosed by this technician
    pub technician: Option<TechnicianId>,
    /// Only payments received inside this window
    pub paid_within: Option<DateRange>,
}

impl UnclearedFilter {
    /// Filter by the technician attached to the owning order
    #[must_use]
    pub fn for_technician(technician: TechnicianId) -> Self {
        Self {
            technician: Some(technician),
            paid_within: None,
        }
    }
}

/// Totals of the payments still waiting for a closure
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclearedSummary {
    /// Sum of cash payments
    pub cash_total: Money,
    /// Sum of every non-cash payment
    pub electronic_total: Money,
    /// `cash_total + electronic_total`
    pub grand_total: Money,
    /// Itemized totals per exact method
    pub by_method: BTreeMap<PaymentMethod, Money>,
    /// Payments included, in `paid_at` order
    pub payment_ids: Vec<PaymentId>,
    /// Distinct orders the payments belong to
    pub order_count: usize,
}

impl UnclearedSummary {
    /// Builds the summary from already-filtered payments.
    ///
    /// Anything that is not cash lands in the electronic bucket, including
    /// legacy payments with an unrecognized method.
    #[must_use]
    pub fn from_payments<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        let mut sorted: Vec<&Payment> = payments.into_iter().collect();
        sorted.sort_by_key(|p| (p.paid_at, p.id));

        let mut summary = Self::default();
        let mut orders: BTreeSet<OrderId> = BTreeSet::new();
        for payment in sorted {
            if payment.method.is_cash() {
                summary.cash_total += payment.amount;
            } else {
                summary.electronic_total += payment.amount;
            }
            *summary.by_method.entry(payment.method).or_default() += payment.amount;
            summary.payment_ids.push(payment.id);
            orders.insert(payment.order_id);
        }
        summary.grand_total = summary.cash_total + summary.electronic_total;
        summary.order_count = orders.len();
        summary
    }

    /// `true` if there is nothing to reconcile
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payment_ids.is_empty()
    }
}

/// Direction for listing closure history
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest closure first
    OldestFirst,
    /// Most recent closure first
    #[default]
    NewestFirst,
}

/// Offset pagination over closure history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Entries to skip
    pub offset: usize,
    /// Maximum entries to return
    pub limit: usize,
    /// Ordering of the history
    pub order: SortOrder,
}

impl Page {
    /// Creates a page request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPage`] if `limit` is zero.
    pub fn new(offset: usize, limit: usize, order: SortOrder) -> Result<Self> {
        if limit == 0 {
            return Err(ValidationError::EmptyPage.into());
        }
        Ok(Self {
            offset,
            limit,
            order,
        })
    }

    /// First page of `limit` entries, newest first
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPage`] if `limit` is zero.
    pub fn first(limit: usize) -> Result<Self> {
        Self::new(0, limit, SortOrder::NewestFirst)
    }

    /// The page after this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            offset: self.offset + self.limit,
            ..self
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payment(order_id: OrderId, soles: i64, method: PaymentMethod, minute: u32) -> Payment {
        Payment {
            id: PaymentId::new(),
            order_id,
            amount: Money::from_soles(soles),
            method,
            paid_at: Utc.with_ymd_and_hms(2025, 3, 10, 12, minute, 0).unwrap(),
            recorded_by: TechnicianId::parse("tech-1").unwrap(),
            cleared_by: None,
        }
    }

    #[test]
    fn summary_splits_cash_and_electronic() {
        let order = OrderId::new();
        let payments = vec![
            payment(order, 50, PaymentMethod::Cash, 1),
            payment(order, 30, PaymentMethod::Yape, 2),
            payment(OrderId::new(), 20, PaymentMethod::Card, 3),
            payment(OrderId::new(), 5, PaymentMethod::Unknown, 4),
        ];

        let summary = UnclearedSummary::from_payments(&payments);
        assert_eq!(summary.cash_total, Money::from_soles(50));
        assert_eq!(summary.electronic_total, Money::from_soles(55));
        assert_eq!(summary.grand_total, Money::from_soles(105));
        assert_eq!(summary.by_method[&PaymentMethod::Yape], Money::from_soles(30));
        assert_eq!(summary.by_method[&PaymentMethod::Unknown], Money::from_soles(5));
        assert_eq!(summary.order_count, 3);
        assert_eq!(summary.payment_ids.len(), 4);
    }

    #[test]
    fn summary_orders_payments_by_time() {
        let order = OrderId::new();
        let late = payment(order, 1, PaymentMethod::Cash, 30);
        let early = payment(order, 2, PaymentMethod::Cash, 5);
        let summary = UnclearedSummary::from_payments([&late, &early]);
        assert_eq!(summary.payment_ids, vec![early.id, late.id]);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let summary = UnclearedSummary::from_payments(std::iter::empty());
        assert!(summary.is_empty());
        assert_eq!(summary.grand_total, Money::ZERO);
        assert_eq!(summary.order_count, 0);
    }

    #[test]
    fn discrepancy_is_recorded_not_enforced() {
        let closure = CashClosure {
            id: ClosureId::new(),
            created_at: Utc::now(),
            declared_total: Money::from_soles(75),
            cash_total: Money::from_soles(50),
            electronic_total: Money::from_soles(30),
            technician_id: TechnicianId::parse("tech-1").unwrap(),
            payment_count: 2,
        };
        assert_eq!(closure.grand_total(), Money::from_soles(80));
        assert_eq!(closure.discrepancy(), Money::from_soles(-5));
    }

    #[test]
    fn page_requires_positive_limit() {
        assert!(Page::first(0).is_err());
        let page = Page::first(10).unwrap().next();
        assert_eq!(page.offset, 10);
        assert_eq!(page.order, SortOrder::NewestFirst);
    }
}
