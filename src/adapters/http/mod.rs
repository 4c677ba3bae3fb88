//! HTTP adapters exposing the core over REST.

pub mod subscriptions;
