//! Webhook signature verification.
//!
//! Verifies the provider's HMAC-SHA256 signature over the raw request body
//! before anything parses it. Re-serializing the body would change the bytes
//! the signature was computed over.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::provider_event::ProviderEvent;
use super::reconcile_errors::ReconcileError;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components of the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// Every v1 signature present. Several appear while a secret is rotated.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a header of the form `t=<timestamp>,v1=<hex>[,v1=<hex>][,v0=<hex>]`.
    pub fn parse(header: &str) -> Result<Self, ReconcileError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| ReconcileError::MalformedSignature("invalid header format".into()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        ReconcileError::MalformedSignature("invalid timestamp".into())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        ReconcileError::MalformedSignature("invalid v1 signature hex".into())
                    })?);
                }
                // v0 is the provider's legacy test scheme, never trusted
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| ReconcileError::MalformedSignature("missing timestamp".into()))?;
        if v1_signatures.is_empty() {
            return Err(ReconcileError::MalformedSignature(
                "missing v1 signature".into(),
            ));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for provider webhook signatures.
pub struct EventVerifier {
    secret: SecretString,
    require_livemode: bool,
}

impl EventVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            require_livemode: false,
        }
    }

    /// Rejects test-mode events once verified.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    /// Verifies the signature over `payload` and parses the event.
    ///
    /// # Errors
    ///
    /// - `MissingSignature` - no header was supplied
    /// - `MalformedSignature` - header could not be parsed
    /// - `TimestampOutOfRange` - signature older than 5 minutes or from the future
    /// - `InvalidSignature` - no v1 signature matched
    /// - `LivemodeMismatch` - test event while live events are required
    /// - `MalformedPayload` - signature matched but the body is not an event
    pub fn verify(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<ProviderEvent, ReconcileError> {
        self.verify_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: i64,
    ) -> Result<ProviderEvent, ReconcileError> {
        let header = signature_header
            .filter(|h| !h.trim().is_empty())
            .ok_or(ReconcileError::MissingSignature)?;
        let header = SignatureHeader::parse(header)?;

        validate_timestamp(header.timestamp, now)?;

        let expected = self.compute_signature(header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(ReconcileError::InvalidSignature);
        }

        let event: ProviderEvent = serde_json::from_slice(payload)
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;

        if self.require_livemode && !event.livemode {
            return Err(ReconcileError::LivemodeMismatch);
        }

        Ok(event)
    }

    /// HMAC-SHA256 over `"{timestamp}.{payload}"`, fed byte-for-byte.
    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, ReconcileError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| ReconcileError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn validate_timestamp(timestamp: i64, now: i64) -> Result<(), ReconcileError> {
    let age = now
        .checked_sub(timestamp)
        .ok_or(ReconcileError::TimestampOutOfRange)?;
    if age > MAX_EVENT_AGE_SECS || age < -MAX_CLOCK_SKEW_SECS {
        return Err(ReconcileError::TimestampOutOfRange);
    }
    Ok(())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
