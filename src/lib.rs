//! Resume Rewriter - billing and entitlement backend
//!
//! This crate implements the subscription, credit-metering, and payment
//! reconciliation core for the resume optimization service. Rewriting itself
//! is an external collaborator; this crate decides who may invoke it and
//! turns confirmed payments into credits.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
