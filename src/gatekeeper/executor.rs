//! Batch action execution
//!
//! Applies one action to every member of a batch. Each member is attempted
//! independently: a failure is recorded under its error code and the batch
//! moves on. Nothing is retried within a pass; the next scheduled cycle will
//! pick up whoever is still eligible.

use crate::platform::{ErrorCode, GuildActions, MemberId, PlatformResult, RoleId, RoleMutator};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use tracing::info;

/// Outcome of executing one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Members the batch asked for.
    pub requested: usize,
    /// Members the action succeeded for.
    pub succeeded: usize,
    /// Failure count per distinct error code.
    pub failures: BTreeMap<ErrorCode, usize>,
}

impl ExecutionResult {
    pub fn failed(&self) -> usize {
        self.requested - self.succeeded
    }

    /// Distinct error codes observed, in stable order.
    pub fn failure_codes(&self) -> Vec<ErrorCode> {
        self.failures.keys().copied().collect()
    }

    fn record(&mut self, outcome: PlatformResult<()>) {
        self.requested += 1;
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(err) => *self.failures.entry(err.code).or_insert(0) += 1,
        }
    }
}

/// Renders as `X/N`.
impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.requested)
    }
}

/// Fold `action` over `members`, never stopping early.
async fn apply_each<F, Fut>(members: &BTreeSet<MemberId>, mut action: F) -> ExecutionResult
where
    F: FnMut(MemberId) -> Fut,
    Fut: Future<Output = PlatformResult<()>>,
{
    let mut result = ExecutionResult::default();
    for member in members {
        result.record(action(*member).await);
    }
    result
}

fn format_codes(codes: &[ErrorCode]) -> String {
    codes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Give `role` to every member in `members`.
pub async fn apply_role_assignment<R>(
    mutator: &R,
    members: &BTreeSet<MemberId>,
    role: RoleId,
    reason: &str,
) -> ExecutionResult
where
    R: RoleMutator + ?Sized,
{
    info!(role = %role, count = members.len(), "assigning role to members");

    let result = apply_each(members, |member| mutator.add_role(member, role, reason)).await;

    if result.failed() > 0 {
        info!(
            "Failed to assign {} roles due to following codes: {}",
            result.failed(),
            format_codes(&result.failure_codes())
        );
    }
    result
}

/// Remove every member in `members` from the community.
pub async fn apply_removal<G>(guild: &G, members: &BTreeSet<MemberId>, reason: &str) -> ExecutionResult
where
    G: GuildActions + ?Sized,
{
    info!(count = members.len(), "removing members from the community");

    let result = apply_each(members, |member| guild.kick(member, reason)).await;

    if result.failed() > 0 {
        info!(
            "Failed to remove {} members due to following codes: {}",
            result.failed(),
            format_codes(&result.failure_codes())
        );
    }
    result
}
