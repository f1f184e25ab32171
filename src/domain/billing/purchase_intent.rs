//! Purchase intents and the checkout metadata schema.
//!
//! A [`PurchaseIntent`] is written into a checkout session's metadata when the
//! session is created and read back verbatim when the provider reports the
//! checkout as completed. The metadata is the only channel between the two
//! sides, so [`PurchaseIntent::to_metadata`] and [`PurchaseIntent::from_metadata`]
//! must stay exact inverses.
//!
//! Metadata layout (all values are strings):
//!
//! | key            | present for            |
//! |----------------|------------------------|
//! | `account_id`   | every intent           |
//! | `intent`       | every intent           |
//! | `tier`         | `subscribe`            |
//! | `credits`      | `credits`              |
//! | `invoice_id`   | `invoice`              |
//! | `amount_cents` | `invoice`              |
//! | `job_post_id`  | `job_post`             |

use std::collections::HashMap;
use std::fmt;

use crate::domain::foundation::{AccountId, InvoiceId, JobPostId, ValidationError};

use super::PlanTier;

/// Metadata keys shared by the checkout initiator and the event classifier.
pub mod metadata_keys {
    pub const ACCOUNT_ID: &str = "account_id";
    pub const INTENT: &str = "intent";
    pub const TIER: &str = "tier";
    pub const CREDITS: &str = "credits";
    pub const INVOICE_ID: &str = "invoice_id";
    pub const AMOUNT_CENTS: &str = "amount_cents";
    pub const JOB_POST_ID: &str = "job_post_id";
}

use metadata_keys as keys;

/// Largest single charge the provider accepts, in cents.
pub const MAX_AMOUNT_CENTS: u64 = 99_999_999;

/// What a checkout is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseIntent {
    SubscribeToPlan { tier: PlanTier },
    BuyCredits { credits: u64 },
    PayInvoice { invoice_id: InvoiceId, amount_cents: u64 },
    FeatureJobPost { job_post_id: JobPostId },
}

impl PurchaseIntent {
    /// Builds a subscription intent. Only paid tiers can be purchased.
    pub fn subscribe(tier: PlanTier) -> Result<Self, ValidationError> {
        if !tier.is_paid() {
            return Err(ValidationError::invalid_format(
                keys::TIER,
                "only paid tiers can be subscribed to",
            ));
        }
        Ok(PurchaseIntent::SubscribeToPlan { tier })
    }

    pub fn buy_credits(credits: u64) -> Result<Self, ValidationError> {
        if credits == 0 {
            return Err(ValidationError::out_of_range(keys::CREDITS, 1, i64::MAX, 0));
        }
        Ok(PurchaseIntent::BuyCredits { credits })
    }

    pub fn pay_invoice(invoice_id: InvoiceId, amount_cents: u64) -> Result<Self, ValidationError> {
        validate_amount(amount_cents)?;
        Ok(PurchaseIntent::PayInvoice {
            invoice_id,
            amount_cents,
        })
    }

    pub fn feature_job_post(job_post_id: JobPostId) -> Self {
        PurchaseIntent::FeatureJobPost { job_post_id }
    }

    /// Value of the `intent` metadata key.
    pub fn kind(&self) -> &'static str {
        match self {
            PurchaseIntent::SubscribeToPlan { .. } => "subscribe",
            PurchaseIntent::BuyCredits { .. } => "credits",
            PurchaseIntent::PayInvoice { .. } => "invoice",
            PurchaseIntent::FeatureJobPost { .. } => "job_post",
        }
    }

    /// True for intents paid through a recurring subscription checkout.
    pub fn is_subscription(&self) -> bool {
        matches!(self, PurchaseIntent::SubscribeToPlan { .. })
    }

    /// Serializes the intent and owning account into checkout metadata.
    pub fn to_metadata(&self, account_id: &AccountId) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert(keys::ACCOUNT_ID.to_string(), account_id.to_string());
        metadata.insert(keys::INTENT.to_string(), self.kind().to_string());

        match self {
            PurchaseIntent::SubscribeToPlan { tier } => {
                metadata.insert(keys::TIER.to_string(), tier.as_str().to_string());
            }
            PurchaseIntent::BuyCredits { credits } => {
                metadata.insert(keys::CREDITS.to_string(), credits.to_string());
            }
            PurchaseIntent::PayInvoice {
                invoice_id,
                amount_cents,
            } => {
                metadata.insert(keys::INVOICE_ID.to_string(), invoice_id.to_string());
                metadata.insert(keys::AMOUNT_CENTS.to_string(), amount_cents.to_string());
            }
            PurchaseIntent::FeatureJobPost { job_post_id } => {
                metadata.insert(keys::JOB_POST_ID.to_string(), job_post_id.to_string());
            }
        }

        metadata
    }

    /// Reads an intent and its owning account back from checkout metadata.
    pub fn from_metadata(
        metadata: &HashMap<String, String>,
    ) -> Result<(AccountId, PurchaseIntent), ValidationError> {
        let account_id = AccountId::new(required(metadata, keys::ACCOUNT_ID)?)?;

        let intent = match required(metadata, keys::INTENT)? {
            "subscribe" => PurchaseIntent::subscribe(required(metadata, keys::TIER)?.parse()?)?,
            "credits" => PurchaseIntent::buy_credits(parse_u64(metadata, keys::CREDITS)?)?,
            "invoice" => PurchaseIntent::pay_invoice(
                InvoiceId::new(required(metadata, keys::INVOICE_ID)?)?,
                parse_u64(metadata, keys::AMOUNT_CENTS)?,
            )?,
            "job_post" => PurchaseIntent::feature_job_post(JobPostId::new(required(
                metadata,
                keys::JOB_POST_ID,
            )?)?),
            other => {
                return Err(ValidationError::invalid_format(
                    keys::INTENT,
                    format!("unknown intent '{}'", other),
                ))
            }
        };

        Ok((account_id, intent))
    }
}

impl fmt::Display for PurchaseIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseIntent::SubscribeToPlan { tier } => write!(f, "subscribe({})", tier.as_str()),
            PurchaseIntent::BuyCredits { credits } => write!(f, "credits({})", credits),
            PurchaseIntent::PayInvoice {
                invoice_id,
                amount_cents,
            } => write!(f, "invoice({}, {})", invoice_id, amount_cents),
            PurchaseIntent::FeatureJobPost { job_post_id } => write!(f, "job_post({})", job_post_id),
        }
    }
}

/// Credit packs offered for one-time purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditPack {
    Starter,
    Standard,
    Bulk,
}

impl CreditPack {
    pub const ALL: [CreditPack; 3] = [CreditPack::Starter, CreditPack::Standard, CreditPack::Bulk];

    pub fn credits(&self) -> u64 {
        match self {
            CreditPack::Starter => 50,
            CreditPack::Standard => 200,
            CreditPack::Bulk => 500,
        }
    }

    pub fn price_cents(&self) -> u64 {
        match self {
            CreditPack::Starter => 500,
            CreditPack::Standard => 1_500,
            CreditPack::Bulk => 3_000,
        }
    }

    /// Product name shown on the hosted checkout page.
    pub fn product_name(&self) -> String {
        format!("{} credits", self.credits())
    }

    pub fn for_credits(credits: u64) -> Option<CreditPack> {
        Self::ALL.into_iter().find(|pack| pack.credits() == credits)
    }
}

/// The `intentKey` a client sends when asking for a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKey {
    Plan(PlanTier),
    Credits(CreditPack),
    Invoice,
    JobPost,
}

impl IntentKey {
    pub fn parse(key: &str) -> Result<Self, ValidationError> {
        match key.trim() {
            "pro" => Ok(IntentKey::Plan(PlanTier::Pro)),
            "teams" => Ok(IntentKey::Plan(PlanTier::Teams)),
            "credits_50" => Ok(IntentKey::Credits(CreditPack::Starter)),
            "credits_200" => Ok(IntentKey::Credits(CreditPack::Standard)),
            "credits_500" => Ok(IntentKey::Credits(CreditPack::Bulk)),
            "invoice" => Ok(IntentKey::Invoice),
            "job_post" => Ok(IntentKey::JobPost),
            "" => Err(ValidationError::empty_field("intent_key")),
            other => Err(ValidationError::invalid_format(
                "intent_key",
                format!("unknown intent key '{}'", other),
            )),
        }
    }

    /// Combines the key with the optional request fields into an intent.
    ///
    /// Fields a key needs but the request lacks fail here, before any
    /// provider call is made.
    pub fn into_intent(
        self,
        invoice_id: Option<&str>,
        amount_cents: Option<u64>,
        job_post_id: Option<&str>,
    ) -> Result<PurchaseIntent, ValidationError> {
        match self {
            IntentKey::Plan(tier) => PurchaseIntent::subscribe(tier),
            IntentKey::Credits(pack) => PurchaseIntent::buy_credits(pack.credits()),
            IntentKey::Invoice => {
                let invoice_id =
                    invoice_id.ok_or_else(|| ValidationError::empty_field(keys::INVOICE_ID))?;
                let amount_cents =
                    amount_cents.ok_or_else(|| ValidationError::empty_field(keys::AMOUNT_CENTS))?;
                PurchaseIntent::pay_invoice(InvoiceId::new(invoice_id)?, amount_cents)
            }
            IntentKey::JobPost => {
                let job_post_id =
                    job_post_id.ok_or_else(|| ValidationError::empty_field(keys::JOB_POST_ID))?;
                Ok(PurchaseIntent::feature_job_post(JobPostId::new(job_post_id)?))
            }
        }
    }
}

fn validate_amount(amount_cents: u64) -> Result<(), ValidationError> {
    if amount_cents == 0 || amount_cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::out_of_range(
            keys::AMOUNT_CENTS,
            1,
            MAX_AMOUNT_CENTS as i64,
            i64::try_from(amount_cents).unwrap_or(i64::MAX),
        ));
    }
    Ok(())
}

fn required<'a>(
    metadata: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, ValidationError> {
    match metadata.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationError::empty_field(key)),
    }
}

fn parse_u64(metadata: &HashMap<String, String>, key: &'static str) -> Result<u64, ValidationError> {
    required(metadata, key)?
        .parse()
        .map_err(|_| ValidationError::invalid_format(key, "expected a non-negative integer"))
}
