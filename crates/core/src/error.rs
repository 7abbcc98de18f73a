//! # Error Module
//!
//! Domain errors raised by the pure ledger rules, independent of storage.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    // === Money errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    // === Wallet errors ===
    #[error("Wallet is inactive: {0}")]
    WalletInactive(String),

    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),

    // === State machine errors ===
    #[error("Illegal {entity} transition: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    // === Validation errors ===
    #[error("Validation failed on {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, CoreError::InsufficientFunds { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::Validation { .. } | CoreError::InvalidAmount(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = CoreError::InsufficientFunds {
            requested: dec!(1000),
            available: dec!(500),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: requested 1000, available 500"
        );

        let err = CoreError::IllegalTransition {
            entity: "withdrawal",
            from: "COMPLETED".to_string(),
            to: "FAILED".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Illegal withdrawal transition: COMPLETED -> FAILED"
        );
    }

    #[test]
    fn test_error_checks() {
        assert!(CoreError::validation("amount", "too small").is_validation());
        assert!(CoreError::InvalidAmount("x".into()).is_validation());
        assert!(!CoreError::WalletInactive("w".into()).is_validation());
        assert!(CoreError::InsufficientFunds {
            requested: dec!(1),
            available: dec!(0)
        }
        .is_insufficient_funds());
    }
}
