//! # Money Module
//!
//! Currency metadata and the one rounding rule used for every money
//! multiplication in the ledger (commission split, refund percentage).
//! All amounts are `rust_decimal::Decimal` kept at two decimal places.

use crate::error::{CoreError, CoreResult};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept for every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// Rounds to the smallest currency unit, half away from zero.
///
/// ```
/// use lexvault_core::round_money;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(round_money(Decimal::from_str("10.005").unwrap()).to_string(), "10.01");
/// assert_eq!(round_money(Decimal::from_str("-10.005").unwrap()).to_string(), "-10.01");
/// ```
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount * rate`, rounded with [`round_money`].
pub fn apply_rate(amount: Decimal, rate: Decimal) -> Decimal {
    round_money(amount * rate)
}

/// Checks that `amount` is strictly positive and has no sub-cent digits.
pub fn ensure_money_amount(amount: Decimal) -> CoreResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(CoreError::InvalidAmount(format!(
            "amount {} has more than {} decimal places",
            amount, MONEY_SCALE
        )));
    }
    Ok(amount)
}

/// A settlement currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code
    pub code: String,
    pub name: String,
    pub symbol: String,
}

impl Currency {
    pub fn new(code: &str, name: &str, symbol: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            name: name.to_string(),
            symbol: symbol.to_string(),
        }
    }

    // === Preset currencies ===

    /// Kenyan Shilling, the default settlement currency
    pub fn kes() -> Self {
        Self::new("KES", "Kenyan Shilling", "KSh")
    }

    pub fn ugx() -> Self {
        Self::new("UGX", "Ugandan Shilling", "USh")
    }

    pub fn tzs() -> Self {
        Self::new("TZS", "Tanzanian Shilling", "TSh")
    }

    pub fn usd() -> Self {
        Self::new("USD", "US Dollar", "$")
    }

    /// Looks up a preset by code, falling back to a bare currency whose
    /// symbol is the code itself.
    pub fn from_code(code: &str) -> Self {
        match code.to_uppercase().as_str() {
            "KES" => Self::kes(),
            "UGX" => Self::ugx(),
            "TZS" => Self::tzs(),
            "USD" => Self::usd(),
            other => Self::new(other, other, other),
        }
    }

    /// Formats an amount for statements, e.g. `KSh 150,000.00`.
    pub fn format_amount(&self, amount: Decimal) -> String {
        let rounded = round_money(amount);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let text = format!("{:.2}", rounded.abs());
        let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!(
            "{}{} {}.{}",
            if negative { "-" } else { "" },
            self.symbol,
            grouped,
            frac
        )
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::kes()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(0.124)), dec!(0.12));
        assert_eq!(round_money(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round_money(dec!(2.5)), dec!(2.50));
    }

    #[test]
    fn test_apply_rate() {
        assert_eq!(apply_rate(dec!(1000), dec!(0.15)), dec!(150));
        assert_eq!(apply_rate(dec!(333.33), dec!(0.5)), dec!(166.67));
        assert_eq!(apply_rate(dec!(99.99), dec!(0)), dec!(0));
    }

    #[test]
    fn test_ensure_money_amount() {
        assert!(ensure_money_amount(dec!(100)).is_ok());
        assert!(ensure_money_amount(dec!(100.50)).is_ok());
        assert!(ensure_money_amount(dec!(100.500)).is_ok());
        assert!(ensure_money_amount(dec!(0)).is_err());
        assert!(ensure_money_amount(dec!(-5)).is_err());
        assert!(ensure_money_amount(dec!(10.001)).is_err());
    }

    #[test]
    fn test_currency_lookup() {
        assert_eq!(Currency::from_code("kes"), Currency::kes());
        assert_eq!(Currency::from_code("EUR").symbol, "EUR");
        assert_eq!(Currency::default().code, "KES");
    }

    #[test]
    fn test_format_amount() {
        let kes = Currency::kes();
        assert_eq!(kes.format_amount(dec!(150000)), "KSh 150,000.00");
        assert_eq!(kes.format_amount(dec!(999.5)), "KSh 999.50");
        assert_eq!(kes.format_amount(dec!(-1234567.891)), "-KSh 1,234,567.89");
        assert_eq!(kes.format_amount(dec!(0)), "KSh 0.00");
    }
}
