//! HandleProviderWebhookHandler - verifies and reconciles one webhook delivery.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::billing::{EventVerifier, IdempotentReconciler, ReconcileError};
use crate::ports::WebhookResult;

/// One webhook delivery as received.
#[derive(Debug, Clone)]
pub struct HandleProviderWebhookCommand {
    /// Raw request body, exactly as signed.
    pub payload: Vec<u8>,
    /// Value of the signature header, if present.
    pub signature: Option<String>,
}

/// Authenticates a delivery, then hands it to the reconciler.
///
/// Verification failures are final (400) and never reach the stores.
pub struct HandleProviderWebhookHandler {
    verifier: Arc<EventVerifier>,
    reconciler: Arc<IdempotentReconciler>,
}

impl HandleProviderWebhookHandler {
    pub fn new(verifier: Arc<EventVerifier>, reconciler: Arc<IdempotentReconciler>) -> Self {
        Self {
            verifier,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleProviderWebhookCommand,
    ) -> Result<WebhookResult, ReconcileError> {
        let event = self
            .verifier
            .verify(&cmd.payload, cmd.signature.as_deref())
            .map_err(|e| {
                warn!(error = %e, payload_bytes = cmd.payload.len(), "Webhook rejected");
                e
            })?;

        debug!(event_id = %event.id, event_type = %event.event_type, "Webhook verified");

        self.reconciler.process(&event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryAccountStore, InMemoryInvoiceStore, InMemoryJobPostStore,
        InMemoryWebhookEventRepository,
    };
    use crate::adapters::stripe::sign_payload;
    use crate::domain::billing::{Account, EventClassifier, PriceCatalog};
    use crate::domain::foundation::{AccountId, Timestamp};
    use crate::ports::AccountStore;
    use secrecy::SecretString;
    use serde_json::json;

    const SECRET: &str = "whsec_handler_test";

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    async fn handler() -> (HandleProviderWebhookHandler, InMemoryAccountStore) {
        let account = Account::register(AccountId::new("acc_1").unwrap(), Timestamp::now());
        let accounts = InMemoryAccountStore::with_accounts([account]).await;
        let reconciler = IdempotentReconciler::new(
            EventClassifier::new(PriceCatalog::new("price_pro", "price_teams")),
            Arc::new(accounts.clone()),
            Arc::new(InMemoryInvoiceStore::new()),
            Arc::new(InMemoryJobPostStore::new()),
            Arc::new(InMemoryWebhookEventRepository::new()),
        );
        let verifier = EventVerifier::new(SecretString::new(SECRET.to_string()));
        (
            HandleProviderWebhookHandler::new(Arc::new(verifier), Arc::new(reconciler)),
            accounts,
        )
    }

    fn credits_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_credits_1",
            "type": "checkout.session.completed",
            "created": chrono::Utc::now().timestamp(),
            "livemode": false,
            "data": {"object": {
                "id": "cs_1",
                "mode": "payment",
                "payment_status": "paid",
                "metadata": {"account_id": "acc_1", "intent": "credits", "credits": "50"}
            }}
        }))
        .unwrap()
    }

    fn signed(payload: &[u8]) -> Option<String> {
        Some(sign_payload(SECRET, chrono::Utc::now().timestamp(), payload).unwrap())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Verification
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn signed_delivery_is_reconciled() {
        let (handler, accounts) = handler().await;
        let payload = credits_payload();

        let result = handler
            .handle(HandleProviderWebhookCommand {
                signature: signed(&payload),
                payload,
            })
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Processed);
        let account = accounts
            .find_by_id(&AccountId::new("acc_1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.credit_balance, 50);
    }

    #[tokio::test]
    async fn missing_signature_never_mutates() {
        let (handler, accounts) = handler().await;

        let err = handler
            .handle(HandleProviderWebhookCommand {
                payload: credits_payload(),
                signature: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::MissingSignature));
        assert_eq!(accounts.grant_count().await, 0);
    }

    #[tokio::test]
    async fn tampered_body_is_rejected() {
        let (handler, accounts) = handler().await;
        let payload = credits_payload();
        let signature = signed(&payload);
        let tampered = String::from_utf8(payload)
            .unwrap()
            .replace("\"50\"", "\"500\"")
            .into_bytes();

        let err = handler
            .handle(HandleProviderWebhookCommand {
                payload: tampered,
                signature,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::InvalidSignature));
        assert_eq!(accounts.grant_count().await, 0);
    }

    #[tokio::test]
    async fn redelivery_is_acknowledged_without_second_grant() {
        let (handler, accounts) = handler().await;
        let payload = credits_payload();

        for _ in 0..2 {
            handler
                .handle(HandleProviderWebhookCommand {
                    signature: signed(&payload),
                    payload: payload.clone(),
                })
                .await
                .unwrap();
        }

        assert_eq!(accounts.grant_count().await, 1);
    }
}
