// Integration tests for the reconciliation cycle
//
// These tests drive the public service API against MockPlatform:
// - Warnings and removals land on the platform
// - Large removals wait for reviewers and respect their answer
// - Repeated passes converge to an empty plan
// - Provider outages skip the pass without mutating anything

use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use warden::clock::FixedClock;
use warden::config::{Settings, WardenConfig};
use warden::gatekeeper::{ConfirmationDecision, RemovalOutcome};
use warden::platform::{
    ChannelId, ErrorCode, Member, MemberId, MockPlatform, PlatformError, RoleId, Severity,
};
use warden::store::MemoryStore;
use warden::Warden;

const GUILD: u64 = 100;
const PENDING: RoleId = RoleId(2);
const VERIFIED: RoleId = RoleId(3);
const REVIEW: ChannelId = ChannelId(10);

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn settings(threshold: f64) -> Settings {
    let mut config = WardenConfig::new(GUILD, PENDING.0, VERIFIED.0, REVIEW.0, 11);
    config.policy.confirmation_threshold = threshold;
    config.policy.confirmation_timeout = "100ms".to_string();
    config.roles.reviewers = Some(50);
    config.settings().unwrap()
}

fn member(id: u64, days_ago: i64, roles: &[RoleId]) -> Member {
    Member {
        id: MemberId(id),
        joined_at: Some(now() - TimeDelta::days(days_ago)),
        roles: roles.iter().copied().collect(),
        bot: false,
    }
}

/// 20 members: 12 verified, 4 new, 2 to warn, 2 to remove.
fn community() -> Vec<Member> {
    let guild = RoleId(GUILD);
    let mut members: Vec<Member> = (1..=12)
        .map(|id| member(id, 200, &[guild, VERIFIED]))
        .collect();
    members.extend((13..=16).map(|id| member(id, 1, &[guild])));
    members.push(member(17, 4, &[guild]));
    members.push(member(18, 20, &[]));
    members.push(member(19, 31, &[guild, PENDING]));
    members.push(member(20, 90, &[guild]));
    members
}

fn warden(mock: &MockPlatform, threshold: f64) -> Warden<MockPlatform, MockPlatform, MemoryStore, FixedClock> {
    Warden::new(
        Arc::new(mock.clone()),
        Arc::new(mock.clone()),
        MemoryStore::new(),
        Arc::new(FixedClock::new(now())),
        &settings(threshold),
    )
}

#[tokio::test]
async fn test_full_pass_under_threshold() {
    let mock = MockPlatform::with_members(community());
    let warden = warden(&mock, 0.2);

    // 2 of 20 = 10%, under the 20% threshold
    let report = warden.run_reconciliation_cycle().await.unwrap();

    assert_eq!(mock.await_calls(), 0);
    assert_eq!(mock.kicked(), vec![MemberId(19), MemberId(20)]);
    assert!(mock.member(MemberId(17)).unwrap().has_role(PENDING));
    assert!(mock.member(MemberId(18)).unwrap().has_role(PENDING));
    assert!(!mock.member(MemberId(13)).unwrap().has_role(PENDING));
    assert_eq!(
        report.text(),
        "Removed `2/2` members.\nAssigned <@&2> role to `2/2` members."
    );
}

#[tokio::test]
async fn test_repeated_passes_converge() {
    let mock = MockPlatform::with_members(community());
    let warden = warden(&mock, 0.2);

    warden.run_reconciliation_cycle().await.unwrap();
    let second = warden.run_reconciliation_cycle().await.unwrap();

    assert!(second.is_quiet());
    assert_eq!(second.removal, RemovalOutcome::NoCandidates);
    assert!(second.warning.is_none());

    let reports = mock.reports();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.title == "Verification system"));
}

#[tokio::test]
async fn test_default_threshold_asks_reviewers() {
    let mock = MockPlatform::with_members(community());
    mock.script_reaction("✅", MemberId(1), false);
    let warden = warden(&mock, 0.0);

    let report = warden.run_reconciliation_cycle().await.unwrap();

    assert_eq!(mock.await_calls(), 1);
    assert!(matches!(
        report.removal,
        RemovalOutcome::Executed {
            decision: ConfirmationDecision::HumanApproved,
            ..
        }
    ));

    let prompt = &mock.messages_in(REVIEW)[0];
    assert_eq!(prompt.content, "Request to remove `2` members was authorized!");
    assert!(prompt.reactions.is_empty());
}

#[tokio::test]
async fn test_reviewer_denial_keeps_members() {
    let mock = MockPlatform::with_members(community());
    mock.script_reaction("✅", MemberId(99), true);
    mock.script_reaction("❌", MemberId(1), false);
    let warden = warden(&mock, 0.0);

    let report = warden.run_reconciliation_cycle().await.unwrap();

    assert!(mock.kicked().is_empty());
    assert_eq!(
        report.removal,
        RemovalOutcome::NotAuthorized {
            requested: 2,
            decision: Some(ConfirmationDecision::HumanDenied),
        }
    );
    assert_eq!(report.removal_line(), "Not authorized to remove `2` members.");
    assert_eq!(mock.reports()[0].severity, Severity::Warning);
}

#[tokio::test]
async fn test_silence_times_out() {
    let mock = MockPlatform::with_members(community());
    let warden = warden(&mock, 0.0);

    let started = std::time::Instant::now();
    let report = warden.run_reconciliation_cycle().await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(mock.kicked().is_empty());
    assert_eq!(
        mock.messages_in(REVIEW)[0].content,
        "Request to remove `2` members was not answered!"
    );
    assert!(matches!(
        report.removal,
        RemovalOutcome::NotAuthorized {
            decision: Some(ConfirmationDecision::TimedOut),
            ..
        }
    ));
}

#[tokio::test]
async fn test_outage_then_recovery() {
    let mock = MockPlatform::with_members(community());
    mock.fail_snapshot(Some(PlatformError::unavailable("gateway down")));
    let warden = warden(&mock, 0.2);

    assert!(warden.run_reconciliation_cycle().await.is_err());
    assert!(mock.kicked().is_empty());
    assert_eq!(mock.reports()[0].severity, Severity::Warning);

    mock.fail_snapshot(None);
    warden.run_reconciliation_cycle().await.unwrap();

    assert_eq!(mock.kicked().len(), 2);
}

#[tokio::test]
async fn test_per_member_failures_are_aggregated() {
    let mock = MockPlatform::with_members(community());
    mock.fail_kick_for(MemberId(19), ErrorCode::Forbidden);
    mock.fail_role_for(MemberId(17), ErrorCode::RateLimited);
    let warden = warden(&mock, 0.2);

    let report = warden.run_reconciliation_cycle().await.unwrap();

    assert_eq!(
        report.text(),
        "Removed `1/2` members.\nAssigned <@&2> role to `1/2` members."
    );
    match &report.removal {
        RemovalOutcome::Executed { result, .. } => {
            assert_eq!(result.failure_codes(), vec![ErrorCode::Forbidden]);
        }
        other => panic!("Expected executed removal, got {:?}", other),
    }

    // The failed member is still eligible next time
    let retry = warden.run_reconciliation_cycle().await.unwrap();
    assert_eq!(retry.classification.needs_removal.len(), 1);
    assert_eq!(retry.classification.needs_warning.len(), 1);
}
