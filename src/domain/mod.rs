//! Domain layer - entities, value objects, and core business rules.

pub mod billing;
pub mod foundation;
