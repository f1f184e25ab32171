//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Host and port do not form a socket address")]
    InvalidBindAddress,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Auth issuer must use HTTPS in production")]
    IssuerMustBeHttps,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("require_livemode is set but the API key is a test key")]
    LivemodeRequiresLiveKey,

    #[error("Job post price must be between 1 and 99999999 cents")]
    InvalidJobPostPrice,

    #[error("Currency must be a lowercase ISO 4217 code")]
    InvalidCurrency,

    #[error("{0} must be an absolute http(s) URL")]
    InvalidRedirectUrl(&'static str),

    #[error("Webhook retention must be at least 3 days")]
    RetentionTooShort,

    #[error("Webhook prune interval must be positive")]
    InvalidPruneInterval,
}
