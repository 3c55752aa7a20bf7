//! Gatekeeper module: Verification & Removal
//!
//! - Classifier: who needs a warning, who needs removal
//! - Confirmation: human sign-off for large removal batches
//! - Executor: per-member actions with aggregated failures
//! - Reconcile: the periodic pass tying the above together
//! - Admission: accepting and welcoming members

pub mod admission;
pub mod classifier;
pub mod confirmation;
pub mod executor;
pub mod reconcile;

pub use admission::{accept_member, welcome_member, AdmissionSettings};
pub use classifier::{classify, ActionBatch, ActionKind, Classification, Policy};
pub use confirmation::{ConfirmationDecision, ConfirmationGate, GateSettings};
pub use executor::{apply_removal, apply_role_assignment, ExecutionResult};
pub use reconcile::{CycleError, CycleReport, ReconcileSettings, Reconciler, RemovalOutcome};
