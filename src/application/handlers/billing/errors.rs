//! Errors returned by the account-facing billing handlers.
//!
//! The webhook path has its own taxonomy ([`ReconcileError`]); these cover
//! checkout, portal, connect and account operations initiated by a user.
//!
//! [`ReconcileError`]: crate::domain::billing::ReconcileError

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::ports::PaymentError;

#[derive(Debug, Error)]
pub enum BillingError {
    /// The caller may not act on the requested account.
    #[error("Not authorized to act on account {0}")]
    Unauthorized(String),

    /// Request fields are missing or invalid for the requested intent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced record, or a provider link it needs, does not exist.
    #[error("{message}")]
    NotFound { code: ErrorCode, message: String },

    #[error("{0}")]
    InsufficientCredits(String),

    /// The payment provider rejected or failed the call.
    #[error("Payment provider error: {0}")]
    Upstream(#[from] PaymentError),

    /// A store read or write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl BillingError {
    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        BillingError::NotFound {
            code,
            message: message.into(),
        }
    }

    /// Machine-readable code for the response body.
    pub fn code(&self) -> String {
        match self {
            BillingError::Unauthorized(_) => "UNAUTHORIZED".to_string(),
            BillingError::Validation(_) => "VALIDATION_FAILED".to_string(),
            BillingError::NotFound { code, .. } => code.to_string(),
            BillingError::InsufficientCredits(_) => "INSUFFICIENT_CREDITS".to_string(),
            BillingError::Upstream(_) => "PAYMENT_PROVIDER_ERROR".to_string(),
            BillingError::Persistence(_) => "INTERNAL_ERROR".to_string(),
        }
    }

    /// Message safe to show to the caller. Persistence details stay in logs.
    pub fn public_message(&self) -> String {
        match self {
            BillingError::Persistence(_) => "An internal error occurred".to_string(),
            BillingError::Upstream(_) => "The payment provider is unavailable, try again".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            code if code.is_not_found() => BillingError::not_found(code, err.message),
            ErrorCode::InsufficientCredits => BillingError::InsufficientCredits(err.message),
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => {
                let field = err.details.get("field").cloned().unwrap_or_default();
                BillingError::Validation(ValidationError::invalid_format(field, err.message))
            }
            ErrorCode::Unauthorized | ErrorCode::Forbidden => {
                BillingError::Unauthorized(err.message)
            }
            _ => BillingError::Persistence(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_domain_error_keeps_code() {
        let err: BillingError =
            DomainError::new(ErrorCode::AccountNotFound, "Account acc_1 not found").into();
        assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(err.public_message(), "Account acc_1 not found");
    }

    #[test]
    fn insufficient_credits_is_its_own_kind() {
        let err: BillingError =
            DomainError::new(ErrorCode::InsufficientCredits, "balance is 3").into();
        assert!(matches!(err, BillingError::InsufficientCredits(_)));
    }

    #[test]
    fn database_errors_hide_details() {
        let err: BillingError = DomainError::database("connection refused on 10.0.0.4").into();
        assert!(matches!(err, BillingError::Persistence(_)));
        assert!(!err.public_message().contains("10.0.0.4"));
    }

    #[test]
    fn payment_errors_become_upstream() {
        let err: BillingError = PaymentError::network("timeout").into();
        assert_eq!(err.code(), "PAYMENT_PROVIDER_ERROR");
    }
}
