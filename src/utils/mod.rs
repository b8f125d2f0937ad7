//! Shared helpers: startup and retry policies.

pub mod bootstrap;
pub mod retry;
