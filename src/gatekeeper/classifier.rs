//! Member status classification
//!
//! Partitions a membership snapshot into two disjoint batches:
//! - `needs_warning`: unverified longer than `warning_after`, not yet
//!   holding the pending role
//! - `needs_removal`: unverified longer than `removal_after`
//!
//! A member is unverified when every role they hold is a baseline role or the
//! pending role. Bots and members with an unknown join date are skipped.
//! Both thresholds compare with strict `>`.

use crate::platform::{Member, MemberId, RoleId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

/// Default delay before an unverified member receives the pending role.
pub const DEFAULT_WARNING_AFTER: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Default delay before an unverified member is removed.
pub const DEFAULT_REMOVAL_AFTER: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Verification policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub warning_after: Duration,
    pub removal_after: Duration,
    pub pending_role: RoleId,
    pub baseline_roles: BTreeSet<RoleId>,
}

impl Policy {
    /// Whether `member` holds nothing beyond baseline and pending roles.
    pub fn is_unverified(&self, member: &Member) -> bool {
        member
            .roles
            .iter()
            .all(|role| *role == self.pending_role || self.baseline_roles.contains(role))
    }

    /// Removal horizon in whole days, for human-readable text.
    pub fn removal_after_days(&self) -> u64 {
        self.removal_after.as_secs() / (24 * 60 * 60)
    }

    /// Warning horizon in whole days, for human-readable text.
    pub fn warning_after_days(&self) -> u64 {
        self.warning_after.as_secs() / (24 * 60 * 60)
    }
}

/// Action applied to a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    AssignWarningRole,
    Remove,
}

/// Members selected for the same action in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBatch {
    kind: ActionKind,
    members: BTreeSet<MemberId>,
}

impl ActionBatch {
    pub fn new(kind: ActionKind, members: BTreeSet<MemberId>) -> Self {
        Self { kind, members }
    }

    pub fn empty(kind: ActionKind) -> Self {
        Self::new(kind, BTreeSet::new())
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn members(&self) -> &BTreeSet<MemberId> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: MemberId) -> bool {
        self.members.contains(&member)
    }
}

/// Result of one classification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub needs_warning: ActionBatch,
    pub needs_removal: ActionBatch,
}

/// Classify `members` against `policy` at time `now`.
///
/// Pure: no I/O, no hidden state.
pub fn classify(members: &[Member], now: DateTime<Utc>, policy: &Policy) -> Classification {
    let mut for_warning = BTreeSet::new();
    let mut for_removal = BTreeSet::new();

    for member in members {
        if member.bot {
            continue;
        }
        let Some(joined_at) = member.joined_at else {
            continue;
        };
        if !policy.is_unverified(member) {
            continue;
        }

        // A join date in the future means clock skew; treat as just joined
        let Ok(since_join) = (now - joined_at).to_std() else {
            continue;
        };

        if since_join > policy.removal_after {
            for_removal.insert(member.id);
        } else if since_join > policy.warning_after && !member.has_role(policy.pending_role) {
            for_warning.insert(member.id);
        }
    }

    debug!(
        warning = for_warning.len(),
        removal = for_removal.len(),
        "classified membership snapshot"
    );

    Classification {
        needs_warning: ActionBatch::new(ActionKind::AssignWarningRole, for_warning),
        needs_removal: ActionBatch::new(ActionKind::Remove, for_removal),
    }
}
