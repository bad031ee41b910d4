//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::identity::IdentityError;
use crate::payments::PaymentError;
use crate::shipping::ShippingError;
use crate::store::StoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid session credential.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Malformed request body or shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced address, product, or order does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The shipping collaborator returned no usable quotes.
    #[error("No shipping quotes available")]
    NoQuotesAvailable,

    /// A collaborator call itself failed.
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    /// A write collided with already-committed state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unauthenticated => {
                Self::Unauthenticated("invalid session credential".to_owned())
            }
            IdentityError::Upstream(msg) => Self::UpstreamFailure(msg),
        }
    }
}

impl From<ShippingError> for AppError {
    fn from(err: ShippingError) -> Self {
        match err {
            ShippingError::NoQuotesAvailable => Self::NoQuotesAvailable,
            other => Self::UpstreamFailure(other.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        Self::UpstreamFailure(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Store(_) | Self::Internal(_) | Self::UpstreamFailure(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NoQuotesAvailable | Self::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::UpstreamFailure(_) => "External service error".to_owned(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product sku-123".to_owned());
        assert_eq!(err.to_string(), "Not found: product sku-123");

        let err = AppError::InvalidArgument("items must be an array".to_owned());
        assert_eq!(err.to_string(), "Invalid argument: items must be an array");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Unauthenticated("no cookie".to_owned())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::InvalidArgument("bad".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::NotFound("gone".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::NoQuotesAvailable),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Conflict("dup".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let response = AppError::Internal("connection string leaked".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
