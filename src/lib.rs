//! Freelance Billing - payment reconciliation for a freelancer workspace.
//!
//! This crate keeps each account's plan tier and credit balance consistent
//! with payment provider events, and starts the checkout sessions that
//! produce them.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
