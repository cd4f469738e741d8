use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

use crate::gateway::GatewayError;
use crate::store::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated but not allowed to do this
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Request conflicts with the current ledger state
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// The service is not configured for this operation. Money-moving
    /// operations fail here rather than guessing a fee.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Payment provider error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Storage layer error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Gateway(gateway_err) => match gateway_err {
                GatewayError::MissingSignature => StatusCode::BAD_REQUEST,
                GatewayError::InvalidSignature => StatusCode::FORBIDDEN,
                GatewayError::Amount { .. } => StatusCode::BAD_REQUEST,
                GatewayError::Api(_) => StatusCode::BAD_GATEWAY,
                GatewayError::UnexpectedResponse { .. } => StatusCode::BAD_GATEWAY,
            },
            Error::Store(store_err) => match store_err {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::DuplicatePeriod { .. } => StatusCode::CONFLICT,
                StoreError::DuplicateEmail { .. } => StatusCode::CONFLICT,
                StoreError::AlreadySettled { .. } => StatusCode::CONFLICT,
                StoreError::UniqueViolation { .. } => StatusCode::CONFLICT,
                StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                StoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message
                .clone()
                .unwrap_or_else(|| "Authentication required".to_string()),
            Error::Forbidden { message } => message.clone(),
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::Configuration { message } => format!("Configuration error: {message}"),
            Error::Gateway(gateway_err) => match gateway_err {
                GatewayError::MissingSignature => "Missing webhook signature".to_string(),
                GatewayError::InvalidSignature => {
                    "Webhook signature verification failed".to_string()
                }
                GatewayError::Amount { .. } => "Invalid payment amount".to_string(),
                GatewayError::Api(_) => "Payment provider request failed".to_string(),
                GatewayError::UnexpectedResponse { message } => {
                    format!("Payment provider error: {message}")
                }
            },
            Error::Store(store_err) => match store_err {
                StoreError::NotFound { entity } => format!("{entity} not found"),
                StoreError::DuplicatePeriod { month, year } => {
                    format!("A dues record already exists for {month} {year}")
                }
                StoreError::DuplicateEmail { email } => {
                    format!("The email address {email} is already in use")
                }
                StoreError::AlreadySettled { id } => {
                    format!("Dues record {id} is already paid")
                }
                StoreError::UniqueViolation { .. } => "Resource already exists".to_string(),
                StoreError::Database(_) | StoreError::Other(_) => {
                    "Database error occurred".to_string()
                }
            },
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. }
            | Error::Other(_)
            | Error::Configuration { .. }
            | Error::Store(StoreError::Database(_) | StoreError::Other(_))
            | Error::Gateway(GatewayError::Api(_) | GatewayError::UnexpectedResponse { .. }) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Store(_) | Error::Conflict { .. } => {
                tracing::warn!("Ledger conflict: {}", self);
            }
            Error::Gateway(_) => {
                tracing::warn!("Payment gateway error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, self.user_message()).into_response()
    }
}
