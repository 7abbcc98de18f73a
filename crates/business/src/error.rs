//! Business layer errors
//!
//! The caller-facing taxonomy. Lower layers convert into it through `From`,
//! so services can use `?` on core and persistence results alike.

use lexvault_core::CoreError;
use lexvault_persistence::PersistenceError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Business operation errors
#[derive(Debug, Error)]
pub enum BusinessError {
    // === Caller errors (no state changed) ===
    #[error("Validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Wallet is inactive for lawyer {0}")]
    WalletInactive(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // === Infrastructure ===
    #[error("Payout provider error: {0}")]
    ExternalProvider(String),

    #[error("Ledger invariant violated: {0}")]
    Invariant(String),

    #[error("Persistence error: {0}")]
    Persistence(#[source] PersistenceError),
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;

impl BusinessError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }

    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::StateConflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::StateConflict(_) => "STATE_CONFLICT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::WalletInactive(_) => "WALLET_INACTIVE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::ExternalProvider(_) => "EXTERNAL_PROVIDER",
            Self::Invariant(_) => "INVARIANT",
            Self::Persistence(_) => "PERSISTENCE",
        }
    }
}

impl From<CoreError> for BusinessError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidAmount(message) => Self::validation("amount", message),
            CoreError::Validation { field, message } => Self::Validation { field, message },
            CoreError::InsufficientFunds {
                requested,
                available,
            } => Self::InsufficientFunds {
                requested,
                available,
            },
            CoreError::WalletInactive(lawyer_id) => Self::WalletInactive(lawyer_id),
            CoreError::IllegalTransition { entity, from, to } => {
                Self::StateConflict(format!("{} cannot move from {} to {}", entity, from, to))
            }
            CoreError::InvariantViolation(message) => Self::Invariant(message),
        }
    }
}

impl From<PersistenceError> for BusinessError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::UniqueViolation(message) => {
                Self::StateConflict(format!("conflicting concurrent write: {}", message))
            }
            other => Self::Persistence(other),
        }
    }
}

impl From<sqlx::Error> for BusinessError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_core_errors_map_to_taxonomy() {
        let err: BusinessError = CoreError::InsufficientFunds {
            requested: dec!(600),
            available: dec!(500),
        }
        .into();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert!(err.to_string().contains("requested 600"));

        let err: BusinessError = CoreError::IllegalTransition {
            entity: "withdrawal",
            from: "COMPLETED".into(),
            to: "FAILED".into(),
        }
        .into();
        assert!(err.is_state_conflict());

        let err: BusinessError = CoreError::InvalidAmount("zero".into()).into();
        assert!(matches!(err, BusinessError::Validation { ref field, .. } if field == "amount"));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let err: BusinessError = PersistenceError::UniqueViolation("uq_withdrawals_in_flight".into()).into();
        assert!(err.is_state_conflict());

        let err: BusinessError = PersistenceError::not_found("Wallet", "W1").into();
        assert_eq!(err.code(), "PERSISTENCE");
    }
}
