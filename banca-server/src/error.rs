//! API error type and its mapping onto HTTP status codes

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use banca_core::{Error, OperationResult, PaymentError, TransferError};

/// Error returned by every handler
///
/// Rendered as the failure envelope with `error.code` set to the
/// machine-readable kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Body or path that could not be parsed
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "MALFORMED_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        let status = match &err {
            TransferError::MissingFields(_)
            | TransferError::SameAccount
            | TransferError::InvalidAmount => StatusCode::BAD_REQUEST,
            TransferError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            TransferError::InactiveAccount(_) => StatusCode::CONFLICT,
            TransferError::InsufficientFunds { .. } | TransferError::BalanceLimitExceeded(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            TransferError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let status = match &err {
            PaymentError::MissingFields(_) | PaymentError::InvalidAmount => StatusCode::BAD_REQUEST,
            PaymentError::ServiceTypeNotFound(_)
            | PaymentError::CardNotFound(_)
            | PaymentError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::InactiveCard(_) | PaymentError::InactiveAccount(_) => StatusCode::CONFLICT,
            PaymentError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, "request failed: {}", self.message);
        } else {
            tracing::debug!(code = %self.code, status = self.status.as_u16(), "request rejected");
        }
        let body: OperationResult<()> = OperationResult::fail(self.code, self.message);
        (self.status, Json(body)).into_response()
    }
}
