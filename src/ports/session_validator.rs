//! Session validation port.
//!
//! The identity provider is an external collaborator that exchanges a bearer
//! token for an account identity. Implementations exist for any OIDC issuer
//! (JWKS-verified JWTs) and for tests.
//!
//! All implementations MUST validate:
//! - **Issuer (iss)**: token comes from the expected identity provider
//! - **Audience (aud)**: token is intended for this service
//! - **Expiry (exp)**: token is not expired

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts the caller's account identity.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a raw token (without the "Bearer " prefix).
    ///
    /// * `Err(AuthError::InvalidToken)` - malformed or bad signature
    /// * `Err(AuthError::TokenExpired)` - signature valid but expired
    /// * `Err(AuthError::ServiceUnavailable)` - identity provider unreachable
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
