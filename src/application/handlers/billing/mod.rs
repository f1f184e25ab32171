//! Billing handlers.
//!
//! ## Commands
//! - Reconciling provider webhooks
//! - Starting checkout sessions
//! - Opening the billing portal and payout (connect) flows
//! - Registering accounts, downgrading plans and consuming credits
//! - Pruning processed webhook records
//!
//! ## Queries
//! - Get account billing state

mod connect_payouts;
mod consume_credits;
mod downgrade_plan;
mod errors;
mod get_account;
mod handle_provider_webhook;
mod open_billing_portal;
mod prune_webhook_events;
mod register_account;
mod start_checkout;

pub use errors::BillingError;

// Commands
pub use connect_payouts::{
    ConnectUrls, OpenConnectDashboardCommand, OpenConnectDashboardHandler,
    OpenConnectOnboardingCommand, OpenConnectOnboardingHandler,
};
pub use consume_credits::{ConsumeCreditsCommand, ConsumeCreditsHandler};
pub use downgrade_plan::{DowngradePlanCommand, DowngradePlanHandler};
pub use handle_provider_webhook::{HandleProviderWebhookCommand, HandleProviderWebhookHandler};
pub use open_billing_portal::{OpenBillingPortalCommand, OpenBillingPortalHandler};
pub use prune_webhook_events::PruneWebhookEventsHandler;
pub use register_account::{RegisterAccountCommand, RegisterAccountHandler, RegisterAccountResult};
pub use start_checkout::{
    CheckoutSettings, StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult,
};

// Queries
pub use get_account::{GetAccountHandler, GetAccountQuery};
