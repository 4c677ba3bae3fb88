//! Application layer - command and query handlers.
//!
//! One handler per operation. Handlers orchestrate ports and domain logic;
//! they hold no state of their own beyond the injected ports.

pub mod handlers;
