//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Bearer token validation (OIDC, mock)
//! - `http` - Axum routes, handlers and middleware
//! - `memory` - In-memory stores for tests and local runs
//! - `postgres` - PostgreSQL stores
//! - `stripe` - Payment provider client (Stripe, mock)

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
