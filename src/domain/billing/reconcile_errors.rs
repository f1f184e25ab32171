//! Error types for webhook reconciliation.
//!
//! Every failure on the webhook path maps to an HTTP status that tells the
//! provider whether to redeliver: 4xx is final, 5xx triggers redelivery.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors that occur while verifying, classifying or applying a provider event.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The signature header is absent.
    #[error("Missing signature header")]
    MissingSignature,

    /// The signature header could not be parsed.
    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    /// No signature in the header matches the payload.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signature timestamp is outside the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// A test-mode event reached an endpoint that only accepts live events.
    #[error("Livemode mismatch")]
    LivemodeMismatch,

    /// The signed payload is not a well-formed provider event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Required intent metadata or fields are missing or invalid.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The referenced account does not exist (yet).
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The referenced invoice does not exist.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// The referenced job post does not exist.
    #[error("Job post not found: {0}")]
    JobPostNotFound(String),

    /// A store write failed after a valid intent was derived.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ReconcileError {
    /// True for failures raised while authenticating the payload.
    pub fn is_signature_error(&self) -> bool {
        matches!(
            self,
            ReconcileError::MissingSignature
                | ReconcileError::MalformedSignature(_)
                | ReconcileError::InvalidSignature
                | ReconcileError::TimestampOutOfRange
                | ReconcileError::LivemodeMismatch
        )
    }

    /// Returns true if the provider should redeliver the event.
    ///
    /// Missing records are retryable because checkout and subscription
    /// events for the same purchase may arrive in either order.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::AccountNotFound(_)
                | ReconcileError::InvoiceNotFound(_)
                | ReconcileError::JobPostNotFound(_)
                | ReconcileError::Persistence(_)
        )
    }

    /// Maps the error to the response status sent to the provider.
    pub fn status_code(&self) -> StatusCode {
        if self.is_retryable() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::BAD_REQUEST
        }
    }

    /// Machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::MissingSignature
            | ReconcileError::MalformedSignature(_)
            | ReconcileError::InvalidSignature
            | ReconcileError::TimestampOutOfRange
            | ReconcileError::LivemodeMismatch => "INVALID_SIGNATURE",
            ReconcileError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            ReconcileError::Validation(_) => "VALIDATION_FAILED",
            ReconcileError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            ReconcileError::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            ReconcileError::JobPostNotFound(_) => "JOB_POST_NOT_FOUND",
            ReconcileError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

/// Store errors surface as persistence failures unless they name a missing
/// record or an ownership conflict.
impl From<DomainError> for ReconcileError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::AccountNotFound => ReconcileError::AccountNotFound(err.message),
            ErrorCode::InvoiceNotFound => ReconcileError::InvoiceNotFound(err.message),
            ErrorCode::JobPostNotFound => ReconcileError::JobPostNotFound(err.message),
            ErrorCode::InvoiceAccountMismatch | ErrorCode::Forbidden => {
                ReconcileError::Validation(ValidationError::invalid_format("account_id", err.message))
            }
            _ => ReconcileError::Persistence(err.to_string()),
        }
    }
}
