//! Signed webhook deliveries for tests.
//!
//! Produces the `stripe-signature` header the provider would send, so unit and
//! integration tests can drive the verifier and the webhook route end to end.
//! Lives beside `MockPaymentProvider` as part of the crate's fixture surface;
//! production code never signs events.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Builds a `t=<timestamp>,v1=<hex hmac>` header for `payload` under `secret`.
///
/// The MAC covers `"{timestamp}.{payload}"`, byte for byte.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}
