//! Authentication types for the domain layer.
//!
//! The identity provider is an opaque collaborator: it exchanges a bearer
//! token for an account identity via the `SessionValidator` port. Nothing here
//! depends on a particular provider.

use super::AccountId;
use thiserror::Error;

/// Caller identity extracted from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The account this caller owns (the token subject).
    pub account_id: AccountId,

    /// Email address from the token claims, when present.
    pub email: Option<String>,

    /// Whether the identity provider has verified the email.
    pub email_verified: bool,
}

impl AuthenticatedUser {
    pub fn new(account_id: AccountId, email: Option<String>, email_verified: bool) -> Self {
        Self {
            account_id,
            email,
            email_verified,
        }
    }

    /// Returns true when this caller may act on the given account.
    pub fn owns(&self, account_id: &AccountId) -> bool {
        &self.account_id == account_id
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The authentication service is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: &str) -> AuthenticatedUser {
        AuthenticatedUser::new(AccountId::new(id).unwrap(), None, false)
    }

    #[test]
    fn caller_owns_own_account_only() {
        let user = caller("acc_1");
        assert!(user.owns(&AccountId::new("acc_1").unwrap()));
        assert!(!user.owns(&AccountId::new("acc_2").unwrap()));
    }

    #[test]
    fn only_service_unavailable_is_transient() {
        assert!(AuthError::service_unavailable("jwks down").is_transient());
        assert!(!AuthError::InvalidToken.is_transient());
        assert!(!AuthError::TokenExpired.is_transient());
    }
}
