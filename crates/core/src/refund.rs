//! # Refund Module
//!
//! Cancellation refund policy, keyed on how long before the session start
//! the cancellation happens.

use crate::money::apply_rate;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

const MILLIS_PER_HOUR: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundPolicy {
    /// 24 hours or more before the session
    Full,
    /// Between 12 and 24 hours before the session
    Half,
    /// Less than 12 hours before the session, or after it started
    NoRefund,
}

impl RefundPolicy {
    pub fn full_refund_hours() -> Decimal {
        Decimal::from(24)
    }

    pub fn half_refund_hours() -> Decimal {
        Decimal::from(12)
    }

    pub fn from_hours_until(hours_until_session: Decimal) -> Self {
        if hours_until_session >= Self::full_refund_hours() {
            RefundPolicy::Full
        } else if hours_until_session >= Self::half_refund_hours() {
            RefundPolicy::Half
        } else {
            RefundPolicy::NoRefund
        }
    }

    pub fn from_schedule(scheduled_start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_hours_until(hours_until(scheduled_start, now))
    }

    /// Refund percentage, 0 to 100.
    pub fn percent(&self) -> Decimal {
        match self {
            RefundPolicy::Full => Decimal::from(100),
            RefundPolicy::Half => Decimal::from(50),
            RefundPolicy::NoRefund => Decimal::ZERO,
        }
    }

    /// Client refund for a gross amount, rounded.
    pub fn refund_amount(&self, gross_amount: Decimal) -> Decimal {
        apply_rate(gross_amount, self.percent() / Decimal::from(100))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefundPolicy::Full => "FULL",
            RefundPolicy::Half => "HALF",
            RefundPolicy::NoRefund => "NO_REFUND",
        }
    }
}

impl fmt::Display for RefundPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exact hours from `now` until `start`, negative once the session began.
pub fn hours_until(start: DateTime<Utc>, now: DateTime<Utc>) -> Decimal {
    Decimal::from((start - now).num_milliseconds()) / Decimal::from(MILLIS_PER_HOUR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_policy_boundaries() {
        assert_eq!(RefundPolicy::from_hours_until(dec!(24.0)), RefundPolicy::Full);
        assert_eq!(RefundPolicy::from_hours_until(dec!(23.999)), RefundPolicy::Half);
        assert_eq!(RefundPolicy::from_hours_until(dec!(12.0)), RefundPolicy::Half);
        assert_eq!(
            RefundPolicy::from_hours_until(dec!(11.999)),
            RefundPolicy::NoRefund
        );
        assert_eq!(RefundPolicy::from_hours_until(dec!(-3)), RefundPolicy::NoRefund);
        assert_eq!(RefundPolicy::from_hours_until(dec!(72)), RefundPolicy::Full);
    }

    #[test]
    fn test_from_schedule_boundaries() {
        let now = Utc::now();
        assert_eq!(
            RefundPolicy::from_schedule(now + Duration::hours(24), now),
            RefundPolicy::Full
        );
        assert_eq!(
            RefundPolicy::from_schedule(now + Duration::milliseconds(86_396_400), now),
            RefundPolicy::Half
        );
        assert_eq!(
            RefundPolicy::from_schedule(now + Duration::hours(12), now),
            RefundPolicy::Half
        );
        assert_eq!(
            RefundPolicy::from_schedule(now + Duration::milliseconds(43_196_400), now),
            RefundPolicy::NoRefund
        );
    }

    #[test]
    fn test_hours_until() {
        let now = Utc::now();
        assert_eq!(hours_until(now + Duration::minutes(90), now), dec!(1.5));
        assert_eq!(hours_until(now - Duration::hours(2), now), dec!(-2));
    }

    #[test]
    fn test_refund_amount() {
        assert_eq!(RefundPolicy::Full.refund_amount(dec!(1200)), dec!(1200));
        assert_eq!(RefundPolicy::Half.refund_amount(dec!(1200)), dec!(600));
        assert_eq!(RefundPolicy::Half.refund_amount(dec!(100.01)), dec!(50.01));
        assert_eq!(RefundPolicy::NoRefund.refund_amount(dec!(1200)), dec!(0));
    }
}
