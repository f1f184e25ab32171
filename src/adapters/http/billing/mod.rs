//! HTTP adapter for billing endpoints.
//!
//! Exposes the billing flow via REST API, mounted at `/api/billing`:
//! - `POST /webhook` - Provider event delivery (signature verified)
//! - `POST /checkout` - Start a hosted checkout
//! - `POST /portal` - Open the customer billing portal
//! - `POST /connect-onboarding` / `POST /connect-dashboard` - Payout account links
//! - `POST /accounts`, `GET /accounts/me` - Register and read billing state
//! - `POST /downgrade` - Return to the Free plan
//! - `POST /credits/consume` - Spend credits

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingApiError, BillingAppState, BillingStores, WebhookApiError};
pub use routes::{billing_router, billing_routes, webhook_routes};
