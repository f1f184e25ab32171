//! StartCheckoutHandler - creates a hosted checkout session for a purchase.
//!
//! The purchase intent travels to the webhook side only through the session
//! metadata, so nothing is written to the stores here apart from the lazily
//! created provider customer.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::{CreditPack, IntentKey, PriceCatalog, PurchaseIntent};
use crate::domain::foundation::{
    AccountId, AuthenticatedUser, ErrorCode, ValidationError,
};
use crate::ports::{
    AccountStore, CheckoutMode, CreateCheckoutRequest, CreateCustomerRequest, InvoiceStore,
    JobPostStore, LineItem, PaymentProvider,
};

use super::BillingError;

/// Prices and redirect targets for checkout sessions.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub catalog: PriceCatalog,
    pub job_post_price_cents: u64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub caller: AuthenticatedUser,
    pub account_id: AccountId,
    pub intent_key: String,
    pub invoice_id: Option<String>,
    pub amount_cents: Option<u64>,
    pub job_post_id: Option<String>,
    /// Overrides the product name shown for invoice and job-post checkouts.
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCheckoutResult {
    pub session_id: String,
    pub url: String,
}

pub struct StartCheckoutHandler {
    accounts: Arc<dyn AccountStore>,
    invoices: Arc<dyn InvoiceStore>,
    job_posts: Arc<dyn JobPostStore>,
    payment_provider: Arc<dyn PaymentProvider>,
    settings: Arc<CheckoutSettings>,
}

impl StartCheckoutHandler {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        invoices: Arc<dyn InvoiceStore>,
        job_posts: Arc<dyn JobPostStore>,
        payment_provider: Arc<dyn PaymentProvider>,
        settings: Arc<CheckoutSettings>,
    ) -> Self {
        Self {
            accounts,
            invoices,
            job_posts,
            payment_provider,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartCheckoutCommand,
    ) -> Result<StartCheckoutResult, BillingError> {
        // 1. Only the account holder may buy for the account
        if !cmd.caller.owns(&cmd.account_id) {
            return Err(BillingError::Unauthorized(cmd.account_id.to_string()));
        }

        // 2. Intent and its required fields, before any external call
        let intent = IntentKey::parse(&cmd.intent_key)?.into_intent(
            cmd.invoice_id.as_deref(),
            cmd.amount_cents,
            cmd.job_post_id.as_deref(),
        )?;
        self.check_target(&cmd.account_id, &intent).await?;

        // 3. Account and provider customer
        let account = self
            .accounts
            .find_by_id(&cmd.account_id)
            .await?
            .ok_or_else(|| {
                BillingError::not_found(
                    ErrorCode::AccountNotFound,
                    format!("Account {} not found", cmd.account_id),
                )
            })?;
        let customer_id = match account.customer_id {
            Some(id) => id,
            None => self.create_customer(&cmd.account_id, cmd.caller.email.clone()).await?,
        };

        // 4. Session
        let mode = if intent.is_subscription() {
            CheckoutMode::Subscription
        } else {
            CheckoutMode::Payment
        };
        let request = CreateCheckoutRequest {
            customer_id,
            mode,
            line_items: vec![self.line_item(&intent, cmd.description.as_deref())?],
            metadata: intent.to_metadata(&cmd.account_id),
            client_reference_id: cmd.account_id.to_string(),
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
        };

        let session = self.payment_provider.create_checkout_session(request).await?;

        info!(
            account_id = %cmd.account_id,
            intent = %intent,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(StartCheckoutResult {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Creates a provider customer and links it, converging on whichever
    /// customer a concurrent checkout linked first.
    async fn create_customer(
        &self,
        account_id: &AccountId,
        email: Option<String>,
    ) -> Result<String, BillingError> {
        let customer = self
            .payment_provider
            .create_customer(CreateCustomerRequest {
                account_id: account_id.clone(),
                email,
            })
            .await?;

        let linked = self.accounts.link_customer(account_id, &customer.id).await?;
        if linked != customer.id {
            info!(
                account_id = %account_id,
                discarded = %customer.id,
                linked = %linked,
                "Concurrent checkout linked another customer"
            );
        }
        Ok(linked)
    }

    /// Invoice and job-post purchases must target an existing record of the
    /// caller's account that still needs paying.
    async fn check_target(
        &self,
        account_id: &AccountId,
        intent: &PurchaseIntent,
    ) -> Result<(), BillingError> {
        match intent {
            PurchaseIntent::PayInvoice {
                invoice_id,
                amount_cents,
            } => {
                let invoice = self
                    .invoices
                    .find_by_id(invoice_id)
                    .await?
                    .filter(|invoice| &invoice.account_id == account_id)
                    .ok_or_else(|| {
                        BillingError::not_found(
                            ErrorCode::InvoiceNotFound,
                            format!("Invoice {} not found", invoice_id),
                        )
                    })?;
                if invoice.is_paid() {
                    return Err(ValidationError::invalid_format(
                        "invoice_id",
                        "invoice is already paid",
                    )
                    .into());
                }
                if invoice.amount_cents != *amount_cents {
                    return Err(ValidationError::invalid_format(
                        "amount_cents",
                        format!("invoice amount is {} cents", invoice.amount_cents),
                    )
                    .into());
                }
                Ok(())
            }
            PurchaseIntent::FeatureJobPost { job_post_id } => {
                let job_post = self
                    .job_posts
                    .find_by_id(job_post_id)
                    .await?
                    .filter(|post| &post.account_id == account_id)
                    .ok_or_else(|| {
                        BillingError::not_found(
                            ErrorCode::JobPostNotFound,
                            format!("Job post {} not found", job_post_id),
                        )
                    })?;
                if job_post.featured_at.is_some() {
                    return Err(ValidationError::invalid_format(
                        "job_post_id",
                        "job post is already featured",
                    )
                    .into());
                }
                Ok(())
            }
            PurchaseIntent::SubscribeToPlan { .. } | PurchaseIntent::BuyCredits { .. } => Ok(()),
        }
    }

    fn line_item(
        &self,
        intent: &PurchaseIntent,
        description: Option<&str>,
    ) -> Result<LineItem, BillingError> {
        let settings = &self.settings;
        let ad_hoc = |name: String, unit_amount_cents: u64| LineItem::AdHoc {
            name,
            unit_amount_cents,
            currency: settings.currency.clone(),
            quantity: 1,
        };
        let described = |fallback: String| {
            description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .unwrap_or(fallback)
        };

        let item = match intent {
            PurchaseIntent::SubscribeToPlan { tier } => {
                let price_id = settings.catalog.price_for(*tier).ok_or_else(|| {
                    ValidationError::invalid_format("tier", format!("no price for {}", tier))
                })?;
                LineItem::Price {
                    price_id: price_id.to_string(),
                    quantity: 1,
                }
            }
            PurchaseIntent::BuyCredits { credits } => {
                let pack = CreditPack::for_credits(*credits).ok_or_else(|| {
                    ValidationError::invalid_format("credits", "not an offered credit pack")
                })?;
                ad_hoc(pack.product_name(), pack.price_cents())
            }
            PurchaseIntent::PayInvoice {
                invoice_id,
                amount_cents,
            } => ad_hoc(described(format!("Invoice {}", invoice_id)), *amount_cents),
            PurchaseIntent::FeatureJobPost { .. } => ad_hoc(
                described("Featured job post".to_string()),
                settings.job_post_price_cents,
            ),
        };
        Ok(item)
    }
}
