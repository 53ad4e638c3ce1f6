//! Identifiers and value objects shared by every part of the repair desk.
//!
//! Money is kept in integer cents to avoid floating point drift when payments
//! are summed into register closures.

use crate::error::{RepairError, Result, ValidationError};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Creates a `", stringify!($name), "` from a UUID")]
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a repair order
    OrderId
);
uuid_id!(
    /// Unique identifier for the device owned by an order
    DeviceId
);
uuid_id!(
    /// Unique identifier for a payment
    PaymentId
);
uuid_id!(
    /// Unique identifier for a cash closure
    ClosureId
);
uuid_id!(
    /// Unique identifier for a client
    ClientId
);

/// Human-readable ticket code printed on the intake slip (e.g. `OT-1A2B3C4D`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket(String);

impl Ticket {
    /// Builds a ticket from a prefix and the order it belongs to.
    ///
    /// Uses the first eight hex digits of the order id, upper-cased.
    #[must_use]
    pub fn for_order(prefix: &str, order_id: &OrderId) -> Self {
        let simple = order_id.as_uuid().simple().to_string();
        let short: String = simple.chars().take(8).collect();
        Self(format!("{prefix}-{}", short.to_uppercase()))
    }

    /// Wraps an existing ticket code (legacy data, imports)
    #[must_use]
    pub const fn new(code: String) -> Self {
        Self(code)
    }

    /// Returns the ticket code
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a technician in the external technician registry
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TechnicianId(String);

impl TechnicianId {
    /// Parses a technician id, rejecting blank values.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BlankTechnician`] if the id is empty after trimming.
    pub fn parse(id: impl AsRef<str>) -> Result<Self> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::BlankTechnician.into());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the inner id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TechnicianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The technician performing an operation.
///
/// Passed explicitly into every operation that attributes work to someone;
/// nothing in the core reads the current technician from ambient state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingTechnician {
    /// Technician identity
    pub id: TechnicianId,
    /// Display name, used in logs and receipts
    pub name: String,
}

impl ActingTechnician {
    /// Creates an acting technician.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BlankTechnician`] if the id is blank.
    pub fn new(id: impl AsRef<str>, name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: TechnicianId::parse(id)?,
            name: name.into(),
        })
    }
}

/// Money amount in cents (to avoid floating point issues).
///
/// Addition and subtraction saturate at the `i64` bounds instead of wrapping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Zero soles
    pub const ZERO: Self = Self(0);

    /// Largest amount a single payment may carry: S/ 100,000,000.00
    pub const MAX_PAYMENT: Self = Self(10_000_000_000);

    /// Creates a new money amount from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new money amount from whole soles
    #[must_use]
    pub const fn from_soles(soles: i64) -> Self {
        Self(soles * 100)
    }

    /// Returns the value in cents
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// `true` if the amount is strictly greater than zero
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parses a decimal amount such as `"50"`, `"12.5"` or `"0.01"`.
    ///
    /// At most two fractional digits are accepted. A leading `-` is allowed so
    /// that callers get an `InvalidAmount` from the ledger rather than a parse
    /// error for negative input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedAmount`] if the text is not a decimal
    /// number with at most two fractional digits.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = || RepairError::from(ValidationError::MalformedAmount(text.to_string()));
        let trimmed = text.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || fraction.len() > 2 || !all_digits(whole) || !all_digits(fraction) {
            return Err(malformed());
        }
        let whole: i64 = whole.parse().map_err(|_| malformed())?;
        let fraction_cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| malformed())? * 10,
            _ => fraction.parse().map_err(|_| malformed())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(malformed)?;
        Ok(Self(if negative { -cents } else { cents }))
    }

    /// Share of `self` in `total`, as a percentage. Zero when `total` is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // cents fit comfortably in f64 for reporting
    pub fn percent_of(self, total: Self) -> f64 {
        if total.0 == 0 {
            return 0.0;
        }
        self.0 as f64 * 100.0 / total.0 as f64
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "S/ {sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Scannable device identity, always stored in normalized form.
///
/// Normalization strips every whitespace character and lower-cases the rest,
/// so `" ABC-123 "` and `"abc-123"` are the same token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QrToken(String);

impl QrToken {
    /// Normalizes a raw scan into a token.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyToken`] if nothing is left after normalization.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_token(raw);
        if normalized.is_empty() {
            return Err(ValidationError::EmptyToken.into());
        }
        Ok(Self(normalized))
    }

    /// Returns the normalized token
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QrToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips whitespace and case-folds a scanned token. Idempotent.
#[must_use]
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Where and how a device is being serviced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Dropped off and repaired at the shop
    #[serde(alias = "taller")]
    Workshop,
    /// Technician visits the client
    #[serde(alias = "domicilio")]
    HomeVisit,
    /// Remote assistance, no physical drop-off
    #[serde(alias = "remoto")]
    Remote,
    /// Unrecognized value in legacy data
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workshop => write!(f, "Workshop"),
            Self::HomeVisit => write!(f, "HomeVisit"),
            Self::Remote => write!(f, "Remote"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Calendar bucket used by reports, evaluated in shop-local time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    /// Every timestamp
    AllTime,
    /// A single calendar day
    Day(NaiveDate),
    /// A calendar month
    Month {
        /// Calendar year
        year: i32,
        /// Month number, 1-12
        month: u32,
    },
    /// A calendar year
    Year(i32),
}

impl Period {
    /// `true` if `at`, seen from `offset`, falls inside the bucket
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>, offset: FixedOffset) -> bool {
        let local = at.with_timezone(&offset).date_naive();
        match *self {
            Self::AllTime => true,
            Self::Day(day) => local == day,
            Self::Month { year, month } => local.year() == year && local.month() == month,
            Self::Year(year) => local.year() == year,
        }
    }
}

/// Inclusive-exclusive time window `[from, to)`; open ends are unbounded
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Creates a range, rejecting inverted bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvertedRange`] if `from` is after `to`.
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<Self> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(ValidationError::InvertedRange.into());
            }
        }
        Ok(Self { from, to })
    }

    /// `true` if `at` is inside the window
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|f| at >= f) && self.to.is_none_or(|t| at < t)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn token_normalization_strips_whitespace_and_case() {
        let a = QrToken::parse(" ABC-123 ").unwrap();
        let b = QrToken::parse("abc-123").unwrap();
        let c = QrToken::parse("Abc -\t123\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "abc-123");
    }

    #[test]
    fn blank_token_is_rejected() {
        let err = QrToken::parse("  \t ").unwrap_err();
        assert!(matches!(
            err,
            RepairError::Validation(ValidationError::EmptyToken)
        ));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "[a-zA-Z0-9ÁÉÍÓÚÑáéíóúñ \\t\\n_-]{0,40}") {
            let once = normalize_token(&raw);
            prop_assert_eq!(normalize_token(&once), once);
        }
    }

    #[test]
    fn money_parse_accepts_decimals() {
        assert_eq!(Money::parse("50").unwrap(), Money::from_soles(50));
        assert_eq!(Money::parse("12.5").unwrap(), Money::from_cents(1250));
        assert_eq!(Money::parse("0.01").unwrap(), Money::from_cents(1));
        assert_eq!(Money::parse(" -3.20 ").unwrap(), Money::from_cents(-320));
    }

    #[test]
    fn money_parse_rejects_garbage() {
        for text in ["", "abc", "1.234", ".5", "1..2", "1,50"] {
            assert!(Money::parse(text).is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(8000).to_string(), "S/ 80.00");
        assert_eq!(Money::from_cents(5).to_string(), "S/ 0.05");
        assert_eq!(Money::from_cents(-250).to_string(), "S/ -2.50");
    }

    #[test]
    fn money_arithmetic_saturates() {
        let big = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(big + big, Money::from_cents(i64::MAX));
        assert_eq!([big, big, big].iter().sum::<Money>(), Money::from_cents(i64::MAX));
        let mut total = big;
        total += big;
        assert_eq!(total, Money::from_cents(i64::MAX));
        assert_eq!(Money::from_cents(i64::MIN) - Money::from_cents(1), Money::from_cents(i64::MIN));
    }

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert!(Money::from_soles(10).percent_of(Money::ZERO).abs() < f64::EPSILON);
        let share = Money::from_soles(25).percent_of(Money::from_soles(100));
        assert!((share - 25.0).abs() < 1e-9);
    }

    #[test]
    fn ticket_uses_prefix_and_short_id() {
        let id = OrderId::from_uuid(Uuid::from_u128(0x1a2b_3c4d_0000_0000_0000_0000_0000_0001));
        assert_eq!(Ticket::for_order("OT", &id).as_str(), "OT-1A2B3C4D");
    }

    #[test]
    fn blank_technician_is_rejected() {
        assert!(TechnicianId::parse("   ").is_err());
        assert_eq!(TechnicianId::parse(" tech-1 ").unwrap().as_str(), "tech-1");
    }

    #[test]
    fn period_uses_local_offset() {
        let lima = FixedOffset::west_opt(5 * 3600).unwrap();
        // 2025-04-01 03:00 UTC is still March 31st in Lima
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 3, 0, 0).unwrap();
        assert!(Period::Month { year: 2025, month: 3 }.contains(at, lima));
        assert!(!Period::Month { year: 2025, month: 4 }.contains(at, lima));
        assert!(Period::Year(2025).contains(at, lima));
        assert!(Period::AllTime.contains(at, lima));
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert!(DateRange::new(Some(late), Some(early)).is_err());
        let range = DateRange::new(Some(early), Some(late)).unwrap();
        assert!(range.contains(early));
        assert!(!range.contains(late));
    }
}
