//! Plan tier definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Subscription plan of an account.
///
/// Transitions between tiers happen only through reconciled subscription
/// events or a user-initiated downgrade to `Free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Default plan for every newly registered account.
    #[default]
    Free,
    /// Paid plan for an individual freelancer.
    Pro,
    /// Paid plan for small agencies.
    Teams,
}

impl PlanTier {
    /// Returns true if this tier requires an active subscription.
    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }

    /// Stable lowercase identifier used in storage and provider metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Teams => "teams",
        }
    }

    /// Returns the display name for this tier.
    pub fn display_name(&self) -> &'static str {
        match self {
            PlanTier::Free => "Free",
            PlanTier::Pro => "Pro",
            PlanTier::Teams => "Teams",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PlanTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "pro" => Ok(PlanTier::Pro),
            "teams" => Ok(PlanTier::Teams),
            other => Err(ValidationError::invalid_format(
                "tier",
                format!("unknown plan tier '{}'", other),
            )),
        }
    }
}

/// Maps provider price identifiers to plan tiers.
///
/// Used when a subscription event carries no tier metadata of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceCatalog {
    pub pro_price_id: String,
    pub teams_price_id: String,
}

impl PriceCatalog {
    pub fn new(pro_price_id: impl Into<String>, teams_price_id: impl Into<String>) -> Self {
        Self {
            pro_price_id: pro_price_id.into(),
            teams_price_id: teams_price_id.into(),
        }
    }

    /// Recurring price for a paid tier. `Free` has none.
    pub fn price_for(&self, tier: PlanTier) -> Option<&str> {
        match tier {
            PlanTier::Free => None,
            PlanTier::Pro => Some(self.pro_price_id.as_str()),
            PlanTier::Teams => Some(self.teams_price_id.as_str()),
        }
    }

    pub fn tier_for_price(&self, price_id: &str) -> Option<PlanTier> {
        if price_id.is_empty() {
            None
        } else if price_id == self.pro_price_id {
            Some(PlanTier::Pro)
        } else if price_id == self.teams_price_id {
            Some(PlanTier::Teams)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_is_not_paid() {
        assert!(!PlanTier::Free.is_paid());
        assert!(PlanTier::Pro.is_paid());
        assert!(PlanTier::Teams.is_paid());
    }

    #[test]
    fn default_tier_is_free() {
        assert_eq!(PlanTier::default(), PlanTier::Free);
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&PlanTier::Teams).unwrap();
        assert_eq!(json, "\"teams\"");
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("Pro".parse::<PlanTier>().unwrap(), PlanTier::Pro);
        assert_eq!(" teams ".parse::<PlanTier>().unwrap(), PlanTier::Teams);
    }

    #[test]
    fn unknown_tier_is_rejected() {
        assert!("enterprise".parse::<PlanTier>().is_err());
    }

    #[test]
    fn catalog_resolves_prices_both_ways() {
        let catalog = PriceCatalog::new("price_pro", "price_teams");
        assert_eq!(catalog.price_for(PlanTier::Teams), Some("price_teams"));
        assert_eq!(catalog.price_for(PlanTier::Free), None);
        assert_eq!(catalog.tier_for_price("price_pro"), Some(PlanTier::Pro));
        assert_eq!(catalog.tier_for_price("price_other"), None);
    }

    #[test]
    fn unconfigured_catalog_never_matches_empty_price() {
        let catalog = PriceCatalog::default();
        assert_eq!(catalog.tier_for_price(""), None);
    }
}
