use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::AuthError;
use crate::catalog::CatalogError;
use crate::checkout::AllocationError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A well-formed request refused by a business rule.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Storage error")]
    Storage(#[from] StoreError),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Rejected(_) => "REJECTED",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Storage(e) if e.is_transient() => "SERVICE_UNAVAILABLE",
            AppError::Storage(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// The message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Rejected(msg)
            | AppError::ServiceUnavailable(msg) => msg.clone(),
            AppError::Storage(e) if e.is_transient() => {
                "The service is busy, please try again".to_string()
            }
            AppError::Storage(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "Internal server error".to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Rejected(msg) => {
                info!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::ServiceUnavailable(msg) => {
                warn!(message = %msg, "Transient failure");
            }
            AppError::Storage(e) if e.is_transient() => {
                warn!(error = ?e, "Transient storage failure");
            }
            AppError::Storage(e) => {
                error!(error = ?e, "Storage error");
            }
            AppError::InternalServerError(msg) => {
                error!(message = %msg, "Application error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        error_response(self.code(), self.public_message(), None, self.status_code())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::SigningKey => AppError::InternalServerError(err.to_string()),
            err => AppError::AuthError(err.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid(msg) => AppError::ValidationError(msg),
            CatalogError::NotFound => AppError::NotFound(err.to_string()),
            CatalogError::StartsInPast | CatalogError::InvalidSchedule => {
                AppError::ValidationError(err.to_string())
            }
            CatalogError::AlreadyFinished
            | CatalogError::CapacityBelowSold { .. }
            | CatalogError::HasTickets => AppError::Rejected(err.to_string()),
            CatalogError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InvalidQuantity => AppError::ValidationError(err.to_string()),
            AllocationError::NotFound | AllocationError::UnknownCustomer => {
                AppError::NotFound(err.to_string())
            }
            AllocationError::EventAlreadyStarted
            | AllocationError::InsufficientAvailability { .. } => {
                AppError::Rejected(err.to_string())
            }
            AllocationError::StorageConflict(_) | AllocationError::CodeCollision { .. } => {
                AppError::ServiceUnavailable(
                    "Checkout could not complete, please try again".to_string(),
                )
            }
            AllocationError::CommitUnknown(_) => AppError::InternalServerError(
                "Checkout outcome unknown, check your tickets before retrying".to_string(),
            ),
            AllocationError::Storage(e) => AppError::Storage(e),
        }
    }
}
