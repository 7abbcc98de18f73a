//! HTTP error mapping

use crate::handlers::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lexvault_business::BusinessError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Business(BusinessError),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error part of the response envelope
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Business(e) => match e {
                BusinessError::Validation { .. } => StatusCode::BAD_REQUEST,
                BusinessError::NotFound { .. } => StatusCode::NOT_FOUND,
                BusinessError::StateConflict(_) => StatusCode::CONFLICT,
                BusinessError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
                BusinessError::WalletInactive(_) | BusinessError::Forbidden(_) => StatusCode::FORBIDDEN,
                BusinessError::ExternalProvider(_) => StatusCode::BAD_GATEWAY,
                BusinessError::Invariant(_) | BusinessError::Persistence(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Business(BusinessError::Validation { field, message }) => ErrorBody {
                code: "VALIDATION",
                message: message.clone(),
                field: Some(field.clone()),
            },
            // internals stay in the log
            ApiError::Business(e @ (BusinessError::Invariant(_) | BusinessError::Persistence(_))) => ErrorBody {
                code: e.code(),
                message: "internal error".to_string(),
                field: None,
            },
            ApiError::Business(e) => ErrorBody {
                code: e.code(),
                message: e.to_string(),
                field: None,
            },
            ApiError::Unauthorized(m) => ErrorBody {
                code: "UNAUTHORIZED",
                message: m.clone(),
                field: None,
            },
            ApiError::Forbidden(m) => ErrorBody {
                code: "FORBIDDEN",
                message: m.clone(),
                field: None,
            },
            ApiError::BadRequest(m) => ErrorBody {
                code: "BAD_REQUEST",
                message: m.clone(),
                field: None,
            },
        }
    }
}

impl From<BusinessError> for ApiError {
    fn from(err: BusinessError) -> Self {
        ApiError::Business(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = ?self, "request failed");
        }
        (status, Json(ApiResponse::<()>::failure(self.body()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BusinessError::validation("amount", "too small"), StatusCode::BAD_REQUEST),
            (BusinessError::not_found("Wallet", "LAW_1"), StatusCode::NOT_FOUND),
            (BusinessError::conflict("busy"), StatusCode::CONFLICT),
            (BusinessError::WalletInactive("LAW_1".into()), StatusCode::FORBIDDEN),
            (BusinessError::Invariant("negative".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_details_hidden() {
        let body = ApiError::from(BusinessError::Invariant("available > balance".into())).body();
        assert_eq!(body.message, "internal error");

        let body = ApiError::from(BusinessError::validation("phone_number", "invalid")).body();
        assert_eq!(body.field.as_deref(), Some("phone_number"));
    }
}
