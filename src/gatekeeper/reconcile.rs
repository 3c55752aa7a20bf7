//! Reconciliation cycle
//!
//! One pass: snapshot → classify → warn → gate → remove → report.
//!
//! The warning batch goes straight to the executor. The removal batch is only
//! executed when the confirmation gate permits it. Every completed pass emits
//! exactly one combined report to the audit sink, even when nothing happened.
//! A pass that cannot read the membership snapshot mutates nothing and emits a
//! warning report instead.

use super::classifier::{classify, Classification, Policy};
use super::confirmation::{ConfirmationDecision, ConfirmationGate, GateSettings};
use super::executor::{apply_removal, apply_role_assignment, ExecutionResult};
use crate::clock::Clock;
use crate::platform::{AuditSink, Platform, PlatformError, RoleId, Severity};
use crate::shutdown::Shutdown;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Title of every reconciliation report.
pub const REPORT_TITLE: &str = "Verification system";

/// Default period between reconciliation passes.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Cycle errors
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Membership snapshot unavailable: {0}")]
    SnapshotUnavailable(#[source] PlatformError),
}

/// What happened to the removal batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Nobody was eligible; the gate was not consulted.
    NoCandidates,
    /// The gate vetoed the batch. `decision` is `None` when the prompt could
    /// not be posted.
    NotAuthorized {
        requested: usize,
        decision: Option<ConfirmationDecision>,
    },
    Executed {
        decision: ConfirmationDecision,
        result: ExecutionResult,
    },
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub classification: Classification,
    /// `None` when the warning batch was empty.
    pub warning: Option<ExecutionResult>,
    pub removal: RemovalOutcome,
    pending_role: RoleId,
}

impl CycleReport {
    pub fn removal_line(&self) -> String {
        match &self.removal {
            RemovalOutcome::NoCandidates => "Found no members to be removed.".to_string(),
            RemovalOutcome::NotAuthorized { requested, .. } => {
                format!("Not authorized to remove `{}` members.", requested)
            }
            RemovalOutcome::Executed { result, .. } => format!("Removed `{}` members.", result),
        }
    }

    pub fn warning_line(&self) -> String {
        let role = self.pending_role.mention();
        match &self.warning {
            None => format!("Found no members to be assigned the {} role.", role),
            Some(result) => format!("Assigned {} role to `{}` members.", role, result),
        }
    }

    /// Combined report body, removal line first.
    pub fn text(&self) -> String {
        format!("{}\n{}", self.removal_line(), self.warning_line())
    }

    /// Whether neither batch had any members.
    pub fn is_quiet(&self) -> bool {
        self.classification.needs_warning.is_empty()
            && self.classification.needs_removal.is_empty()
    }

    /// Warning when something was vetoed or failed, info otherwise.
    pub fn severity(&self) -> Severity {
        let warning_failed = self.warning.as_ref().is_some_and(|r| r.failed() > 0);
        let removal_troubled = match &self.removal {
            RemovalOutcome::NoCandidates => false,
            RemovalOutcome::NotAuthorized { .. } => true,
            RemovalOutcome::Executed { result, .. } => result.failed() > 0,
        };
        if warning_failed || removal_troubled {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// Settings for the reconciliation task
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSettings {
    pub policy: Policy,
    pub gate: GateSettings,
    pub interval: Duration,
}

/// Runs reconciliation passes against a platform
pub struct Reconciler<P: ?Sized, A: ?Sized, C: ?Sized> {
    platform: Arc<P>,
    audit: Arc<A>,
    clock: Arc<C>,
    settings: ReconcileSettings,
}

impl<P, A, C> Reconciler<P, A, C>
where
    P: Platform + ?Sized,
    A: AuditSink + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(platform: Arc<P>, audit: Arc<A>, clock: Arc<C>, settings: ReconcileSettings) -> Self {
        Self {
            platform,
            audit,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Run one full pass and emit its report.
    ///
    /// Safe to call on a fixed period: a member acted on in one pass is no
    /// longer eligible in the next.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started_at = self.clock.now();
        let policy = &self.settings.policy;
        info!("Running verification cycle");

        let members = match self.platform.list_members().await {
            Ok(members) => members,
            Err(e) => {
                warn!(error = %e, "Membership snapshot unavailable, skipping cycle");
                self.emit(
                    &format!("Skipped verification cycle: membership snapshot unavailable ({}).", e),
                    Severity::Warning,
                )
                .await;
                return Err(CycleError::SnapshotUnavailable(e));
            }
        };
        let total = members.len();

        let classification = classify(&members, started_at, policy);
        info!(
            total,
            warning = classification.needs_warning.len(),
            removal = classification.needs_removal.len(),
            "Classified members"
        );

        let warning = if classification.needs_warning.is_empty() {
            None
        } else {
            let reason = format!(
                "Member has not verified in {} days",
                policy.warning_after_days()
            );
            Some(
                apply_role_assignment(
                    &*self.platform,
                    classification.needs_warning.members(),
                    policy.pending_role,
                    &reason,
                )
                .await,
            )
        };

        let removal = self.handle_removal(&classification, total).await;

        let report = CycleReport {
            started_at,
            classification,
            warning,
            removal,
            pending_role: policy.pending_role,
        };
        self.emit(&report.text(), report.severity()).await;
        info!("Verification cycle finished");

        Ok(report)
    }

    async fn handle_removal(&self, classification: &Classification, total: usize) -> RemovalOutcome {
        let batch = &classification.needs_removal;
        if batch.is_empty() {
            return RemovalOutcome::NoCandidates;
        }

        let policy = &self.settings.policy;
        let gate = ConfirmationGate::new(&*self.platform, &self.settings.gate);
        let decision = match gate
            .authorize(batch.len(), total, policy.removal_after_days())
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Could not post confirmation prompt, not removing anyone");
                return RemovalOutcome::NotAuthorized {
                    requested: batch.len(),
                    decision: None,
                };
            }
        };

        if !decision.permits_execution() {
            debug!(%decision, "Removal batch vetoed");
            return RemovalOutcome::NotAuthorized {
                requested: batch.len(),
                decision: Some(decision),
            };
        }

        let reason = format!(
            "Member has not verified in {} days",
            policy.removal_after_days()
        );
        let result = apply_removal(&*self.platform, batch.members(), &reason).await;
        RemovalOutcome::Executed { decision, result }
    }

    async fn emit(&self, text: &str, severity: Severity) {
        if let Err(e) = self.audit.report(REPORT_TITLE, text, severity).await {
            warn!(error = %e, "Failed to deliver verification report");
        }
    }

    /// Run passes on a fixed period until `shutdown` fires.
    ///
    /// The first pass starts immediately. A pass in progress is never
    /// interrupted.
    pub async fn run(&self, mut shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        debug!(error = %e, "Verification cycle aborted, retrying next period");
                    }
                }
            }
        }

        info!("Reconciliation task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::gatekeeper::classifier::{DEFAULT_REMOVAL_AFTER, DEFAULT_WARNING_AFTER};
    use crate::platform::{ChannelId, ErrorCode, Member, MemberId, MockPlatform};
    use chrono::{Duration as TimeDelta, TimeZone};

    const GUILD: RoleId = RoleId(1);
    const PENDING: RoleId = RoleId(2);
    const VERIFIED: RoleId = RoleId(3);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn settings(threshold: f64) -> ReconcileSettings {
        ReconcileSettings {
            policy: Policy {
                warning_after: DEFAULT_WARNING_AFTER,
                removal_after: DEFAULT_REMOVAL_AFTER,
                pending_role: PENDING,
                baseline_roles: [GUILD].into_iter().collect(),
            },
            gate: GateSettings {
                threshold,
                timeout: Duration::from_millis(50),
                review_channel: ChannelId(10),
                reviewer_role: None,
                approve_token: "approve".to_string(),
                deny_token: "deny".to_string(),
            },
            interval: Duration::from_millis(20),
        }
    }

    fn member(id: u64, days_ago: i64, roles: &[RoleId]) -> Member {
        Member {
            id: MemberId(id),
            joined_at: Some(now() - TimeDelta::days(days_ago)),
            roles: roles.iter().copied().collect(),
            bot: false,
        }
    }

    fn community() -> Vec<Member> {
        vec![
            member(1, 1, &[GUILD]),
            member(2, 5, &[GUILD]),
            member(3, 40, &[GUILD, PENDING]),
            member(4, 400, &[GUILD, VERIFIED]),
            member(5, 10, &[]),
        ]
    }

    fn reconciler(
        mock: &MockPlatform,
        threshold: f64,
    ) -> Reconciler<MockPlatform, MockPlatform, FixedClock> {
        Reconciler::new(
            Arc::new(mock.clone()),
            Arc::new(mock.clone()),
            Arc::new(FixedClock::new(now())),
            settings(threshold),
        )
    }

    #[tokio::test]
    async fn test_cycle_warns_and_removes() {
        let mock = MockPlatform::with_members(community());
        let reconciler = reconciler(&mock, 0.5);

        let report = reconciler.run_cycle().await.unwrap();

        assert!(mock.member(MemberId(2)).unwrap().has_role(PENDING));
        assert!(mock.member(MemberId(5)).unwrap().has_role(PENDING));
        assert_eq!(mock.kicked(), vec![MemberId(3)]);
        assert_eq!(
            report.text(),
            "Removed `1/1` members.\nAssigned <@&2> role to `2/2` members."
        );
        assert!(matches!(
            report.removal,
            RemovalOutcome::Executed {
                decision: ConfirmationDecision::AutoApproved,
                ..
            }
        ));

        let reports = mock.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].title, REPORT_TITLE);
        assert_eq!(reports[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_second_cycle_is_quiet() {
        let mock = MockPlatform::with_members(community());
        let reconciler = reconciler(&mock, 0.5);

        reconciler.run_cycle().await.unwrap();
        let second = reconciler.run_cycle().await.unwrap();

        assert!(second.is_quiet());
        assert_eq!(
            second.text(),
            "Found no members to be removed.\nFound no members to be assigned the <@&2> role."
        );
        // A report is emitted even when nothing happened
        assert_eq!(mock.reports().len(), 2);
    }

    #[tokio::test]
    async fn test_unanswered_prompt_vetoes_removal() {
        let mock = MockPlatform::with_members(community());
        let reconciler = reconciler(&mock, 0.0);

        let report = reconciler.run_cycle().await.unwrap();

        assert!(mock.kicked().is_empty());
        assert_eq!(report.removal_line(), "Not authorized to remove `1` members.");
        assert_eq!(
            report.removal,
            RemovalOutcome::NotAuthorized {
                requested: 1,
                decision: Some(ConfirmationDecision::TimedOut),
            }
        );
        // Warnings are not held back by the gate
        assert!(mock.member(MemberId(2)).unwrap().has_role(PENDING));
        assert_eq!(mock.reports()[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_approved_prompt_allows_removal() {
        let mock = MockPlatform::with_members(community());
        mock.script_reaction("approve", MemberId(4), false);
        let reconciler = reconciler(&mock, 0.0);

        let report = reconciler.run_cycle().await.unwrap();

        assert_eq!(mock.kicked(), vec![MemberId(3)]);
        assert!(matches!(
            report.removal,
            RemovalOutcome::Executed {
                decision: ConfirmationDecision::HumanApproved,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_prompt_failure_is_a_veto() {
        let mock = MockPlatform::with_members(community());
        mock.fail_send(true);
        let reconciler = reconciler(&mock, 0.0);

        let report = reconciler.run_cycle().await.unwrap();

        assert!(mock.kicked().is_empty());
        assert_eq!(
            report.removal,
            RemovalOutcome::NotAuthorized {
                requested: 1,
                decision: None,
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_failure_skips_cycle() {
        let mock = MockPlatform::with_members(community());
        mock.fail_snapshot(Some(PlatformError::unavailable("gateway down")));
        let reconciler = reconciler(&mock, 0.5);

        let err = reconciler.run_cycle().await.unwrap_err();

        assert!(matches!(err, CycleError::SnapshotUnavailable(_)));
        assert!(mock.kicked().is_empty());
        assert!(!mock.member(MemberId(2)).unwrap().has_role(PENDING));

        let reports = mock.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity, Severity::Warning);
        assert!(reports[0].text.starts_with("Skipped verification cycle"));
    }

    #[tokio::test]
    async fn test_partial_failures_are_reported() {
        let mock = MockPlatform::with_members(community());
        mock.fail_role_for(MemberId(5), ErrorCode::Forbidden);
        let reconciler = reconciler(&mock, 0.5);

        let report = reconciler.run_cycle().await.unwrap();

        assert_eq!(report.warning_line(), "Assigned <@&2> role to `1/2` members.");
        assert_eq!(report.severity(), Severity::Warning);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mock = MockPlatform::with_members(community());
        let reconciler = reconciler(&mock, 0.5);
        let (handle, shutdown) = crate::shutdown::channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(70)).await;
            handle.trigger();
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(reconciler.run(shutdown), stopper);
        })
        .await
        .unwrap();

        // First pass is immediate, later passes keep reporting
        assert!(mock.reports().len() >= 2);
        assert_eq!(mock.kicked(), vec![MemberId(3)]);
    }
}
