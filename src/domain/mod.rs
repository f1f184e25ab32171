//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, auth)
//! - `billing` - Plans, credits, purchase intents and provider event reconciliation

pub mod billing;
pub mod foundation;
