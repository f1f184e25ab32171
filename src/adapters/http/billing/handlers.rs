//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the application layer handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::billing::{
    BillingError, CheckoutSettings, ConnectUrls, ConsumeCreditsCommand, ConsumeCreditsHandler,
    DowngradePlanCommand, DowngradePlanHandler, GetAccountHandler, GetAccountQuery,
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, OpenBillingPortalCommand,
    OpenBillingPortalHandler, OpenConnectDashboardCommand, OpenConnectDashboardHandler,
    OpenConnectOnboardingCommand, OpenConnectOnboardingHandler, RegisterAccountCommand,
    RegisterAccountHandler, StartCheckoutCommand, StartCheckoutHandler,
};
use crate::domain::billing::{EventClassifier, EventVerifier, IdempotentReconciler, ReconcileError};
use crate::domain::foundation::AccountId;
use crate::ports::{AccountStore, InvoiceStore, JobPostStore, PaymentProvider, WebhookEventRepository};

use super::super::middleware::RequireAuth;
use super::dto::{
    AccountResponse, ConsumeCreditsRequest, ErrorResponse, StartCheckoutRequest, UrlResponse,
    WebhookAck,
};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Storage ports shared by the billing handlers.
#[derive(Clone)]
pub struct BillingStores {
    pub accounts: Arc<dyn AccountStore>,
    pub invoices: Arc<dyn InvoiceStore>,
    pub job_posts: Arc<dyn JobPostStore>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
}

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct BillingAppState {
    pub stores: BillingStores,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub verifier: Arc<EventVerifier>,
    pub reconciler: Arc<IdempotentReconciler>,
    pub checkout: Arc<CheckoutSettings>,
    pub portal_return_url: String,
    pub connect_urls: ConnectUrls,
}

impl BillingAppState {
    pub fn new(
        stores: BillingStores,
        payment_provider: Arc<dyn PaymentProvider>,
        verifier: EventVerifier,
        checkout: CheckoutSettings,
        portal_return_url: impl Into<String>,
        connect_urls: ConnectUrls,
    ) -> Self {
        let reconciler = IdempotentReconciler::new(
            EventClassifier::new(checkout.catalog.clone()),
            stores.accounts.clone(),
            stores.invoices.clone(),
            stores.job_posts.clone(),
            stores.webhook_events.clone(),
        );
        Self {
            stores,
            payment_provider,
            verifier: Arc::new(verifier),
            reconciler: Arc::new(reconciler),
            checkout: Arc::new(checkout),
            portal_return_url: portal_return_url.into(),
            connect_urls,
        }
    }

    pub fn webhook_handler(&self) -> HandleProviderWebhookHandler {
        HandleProviderWebhookHandler::new(self.verifier.clone(), self.reconciler.clone())
    }

    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.stores.accounts.clone(),
            self.stores.invoices.clone(),
            self.stores.job_posts.clone(),
            self.payment_provider.clone(),
            self.checkout.clone(),
        )
    }

    pub fn portal_handler(&self) -> OpenBillingPortalHandler {
        OpenBillingPortalHandler::new(
            self.stores.accounts.clone(),
            self.payment_provider.clone(),
            self.portal_return_url.clone(),
        )
    }

    pub fn connect_onboarding_handler(&self) -> OpenConnectOnboardingHandler {
        OpenConnectOnboardingHandler::new(
            self.stores.accounts.clone(),
            self.payment_provider.clone(),
            self.connect_urls.clone(),
        )
    }

    pub fn connect_dashboard_handler(&self) -> OpenConnectDashboardHandler {
        OpenConnectDashboardHandler::new(self.stores.accounts.clone(), self.payment_provider.clone())
    }

    pub fn register_account_handler(&self) -> RegisterAccountHandler {
        RegisterAccountHandler::new(self.stores.accounts.clone())
    }

    pub fn get_account_handler(&self) -> GetAccountHandler {
        GetAccountHandler::new(self.stores.accounts.clone())
    }

    pub fn downgrade_handler(&self) -> DowngradePlanHandler {
        DowngradePlanHandler::new(self.stores.accounts.clone(), self.payment_provider.clone())
    }

    pub fn consume_credits_handler(&self) -> ConsumeCreditsHandler {
        ConsumeCreditsHandler::new(self.stores.accounts.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/webhook - Provider event delivery
///
/// The body is taken as raw bytes; the signature covers them exactly.
pub async fn handle_provider_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state
        .webhook_handler()
        .handle(HandleProviderWebhookCommand {
            payload: body.to_vec(),
            signature,
        })
        .await?;

    Ok(Json(WebhookAck::received()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/checkout - Start a hosted checkout
pub async fn start_checkout(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<Json<UrlResponse>, BillingApiError> {
    let account_id = AccountId::new(request.account_id).map_err(BillingError::from)?;
    let cmd = StartCheckoutCommand {
        caller: user,
        account_id,
        intent_key: request.intent_key,
        invoice_id: request.invoice_id,
        amount_cents: request.amount_cents,
        job_post_id: request.job_post_id,
        description: request.description,
    };

    let result = state.start_checkout_handler().handle(cmd).await?;

    Ok(Json(UrlResponse { url: result.url }))
}

/// POST /api/billing/portal - Open the customer billing portal
pub async fn open_billing_portal(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UrlResponse>, BillingApiError> {
    let url = state
        .portal_handler()
        .handle(OpenBillingPortalCommand {
            account_id: user.account_id,
        })
        .await?;
    Ok(Json(UrlResponse { url }))
}

/// POST /api/billing/connect-onboarding - Start or resume payout onboarding
pub async fn open_connect_onboarding(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UrlResponse>, BillingApiError> {
    let url = state
        .connect_onboarding_handler()
        .handle(OpenConnectOnboardingCommand {
            account_id: user.account_id,
            email: user.email,
        })
        .await?;
    Ok(Json(UrlResponse { url }))
}

/// POST /api/billing/connect-dashboard - Open the payout dashboard
pub async fn open_connect_dashboard(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UrlResponse>, BillingApiError> {
    let url = state
        .connect_dashboard_handler()
        .handle(OpenConnectDashboardCommand {
            account_id: user.account_id,
        })
        .await?;
    Ok(Json(UrlResponse { url }))
}

/// POST /api/billing/accounts - Register the caller's billing account
pub async fn register_account(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .register_account_handler()
        .handle(RegisterAccountCommand {
            account_id: user.account_id,
        })
        .await?;

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(AccountResponse::from(result.account))))
}

/// POST /api/billing/downgrade - Cancel the subscription and return to Free
pub async fn downgrade_plan(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AccountResponse>, BillingApiError> {
    let account = state
        .downgrade_handler()
        .handle(DowngradePlanCommand {
            account_id: user.account_id,
        })
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

/// POST /api/billing/credits/consume - Spend credits
pub async fn consume_credits(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ConsumeCreditsRequest>,
) -> Result<Json<AccountResponse>, BillingApiError> {
    let account = state
        .consume_credits_handler()
        .handle(ConsumeCreditsCommand {
            account_id: user.account_id,
            credits: request.credits,
        })
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/billing/accounts/me - Current billing state
pub async fn get_account(
    State(state): State<BillingAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AccountResponse>, BillingApiError> {
    let account = state
        .get_account_handler()
        .handle(GetAccountQuery {
            account_id: user.account_id,
        })
        .await?;
    Ok(Json(AccountResponse::from(account)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Converts account-facing handler errors to HTTP responses.
#[derive(Debug)]
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BillingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BillingError::Validation(_) => StatusCode::BAD_REQUEST,
            BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
            BillingError::InsufficientCredits(_) => StatusCode::CONFLICT,
            BillingError::Upstream(_) => StatusCode::BAD_GATEWAY,
            BillingError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "Billing request failed");
        }

        let body = ErrorResponse::new(self.0.code(), self.0.public_message());
        (status, Json(body)).into_response()
    }
}

/// Converts webhook failures to the status the provider acts on:
/// 4xx is final, 5xx is redelivered.
#[derive(Debug)]
pub struct WebhookApiError(ReconcileError);

impl From<ReconcileError> for WebhookApiError {
    fn from(err: ReconcileError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let message = if self.0.is_retryable() {
            "Event could not be applied, retry later".to_string()
        } else {
            self.0.to_string()
        };
        let body = ErrorResponse::new(self.0.code(), message);
        (status, Json(body)).into_response()
    }
}
