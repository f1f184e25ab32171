//! Axum router configuration for billing endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::super::middleware::{auth_middleware, AuthState};
use super::handlers::{
    consume_credits, downgrade_plan, get_account, handle_provider_webhook, open_billing_portal,
    open_connect_dashboard, open_connect_onboarding, register_account, start_checkout,
    BillingAppState,
};

/// Routes acting on the caller's own billing account.
///
/// # Routes
///
/// All require a Bearer token.
/// - `POST /checkout` - Start a hosted checkout for a purchase intent
/// - `POST /portal` - Open the customer billing portal
/// - `POST /connect-onboarding` - Start or resume payout onboarding
/// - `POST /connect-dashboard` - Open the payout dashboard
/// - `POST /accounts` - Register the caller's billing account
/// - `GET /accounts/me` - Current billing state
/// - `POST /downgrade` - Cancel the subscription and return to Free
/// - `POST /credits/consume` - Spend credits
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/checkout", post(start_checkout))
        .route("/portal", post(open_billing_portal))
        .route("/connect-onboarding", post(open_connect_onboarding))
        .route("/connect-dashboard", post(open_connect_dashboard))
        .route("/accounts", post(register_account))
        .route("/accounts/me", get(get_account))
        .route("/downgrade", post(downgrade_plan))
        .route("/credits/consume", post(consume_credits))
}

/// Provider webhook route.
///
/// Kept apart from the user routes because deliveries carry a signature,
/// not a Bearer token.
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/webhook", post(handle_provider_webhook))
}

/// Complete billing router, mounted at `/api/billing`.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .merge(billing_router(state, validator))
///     .route("/health", get(|| async { "ok" }));
/// ```
pub fn billing_router(state: BillingAppState, validator: AuthState) -> Router {
    let user_routes =
        billing_routes().layer(middleware::from_fn_with_state(validator, auth_middleware));

    Router::new()
        .nest("/api/billing", user_routes.merge(webhook_routes()))
        .with_state(state)
}
