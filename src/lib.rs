//! Warden - Member Verification Reconciliation
//!
//! Keeps a community's membership consistent with its verification policy.
//!
//! Key principles:
//! - Fresh snapshot every pass, nothing cached across passes
//! - Large removals need a human answer within a bounded wait
//! - Per-member failures never abort a batch
//! - The reminder cadence survives restarts

pub mod clock;
pub mod config;
pub mod gatekeeper;
pub mod platform;
pub mod reminder;
pub mod service;
pub mod shutdown;
pub mod snapshot;
pub mod store;

pub use service::Warden;
