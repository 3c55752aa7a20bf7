use super::{load_config, logging};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use warden::clock::SystemClock;
use warden::config::Settings;
use warden::platform::{AuditSink, ChannelAuditSink, MemberId, MockPlatform, TracingAuditSink};
use warden::reminder::ReminderStore;
use warden::snapshot::load_snapshot;
use warden::store::{MemoryStore, SqliteStore};
use warden::Warden;

/// Reviewer identity used for scripted answers.
const SIMULATED_REVIEWER: MemberId = MemberId(0);

/// How a simulated confirmation prompt is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Approve,
    Deny,
    Unanswered,
}

impl Answer {
    fn from_flags(approve: bool, deny: bool) -> Self {
        match (approve, deny) {
            (true, _) => Answer::Approve,
            (_, true) => Answer::Deny,
            _ => Answer::Unanswered,
        }
    }
}

/// Run one reconciliation and one reminder cycle offline
///
/// The platform is an in-memory copy of the snapshot. The configured store is
/// only read: its reminder id seeds a private in-memory store so the real
/// cadence is left alone.
pub async fn execute(
    members: String,
    config: Option<String>,
    approve: bool,
    deny: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, config) = load_config(config)?;
    logging::init(&config.logging)?;
    let settings = config.settings()?;
    let snapshot = load_snapshot(Path::new(&members))?;

    let last_reminder = if settings.store_path.exists() {
        let store = SqliteStore::open(&settings.store_path).await?;
        ReminderStore::new(store).load().await?
    } else {
        None
    };

    let output = simulate(
        snapshot,
        settings,
        Answer::from_flags(approve, deny),
        last_reminder,
    )
    .await?;
    print!("{}", output);
    Ok(())
}

async fn simulate(
    snapshot: Vec<warden::platform::Member>,
    mut settings: Settings,
    answer: Answer,
    last_reminder: Option<warden::platform::MessageId>,
) -> Result<String, Box<dyn std::error::Error>> {
    let mock = MockPlatform::with_members(snapshot);
    let gate = &mut settings.reconcile.gate;
    match answer {
        Answer::Approve => mock.script_reaction(&gate.approve_token, SIMULATED_REVIEWER, false),
        Answer::Deny => mock.script_reaction(&gate.deny_token, SIMULATED_REVIEWER, false),
        // Nobody is watching, no point waiting
        Answer::Unanswered => gate.timeout = Duration::ZERO,
    }

    let store = MemoryStore::new();
    if let Some(id) = last_reminder {
        ReminderStore::new(store.clone()).save(id).await?;
    }

    let audit: Arc<dyn AuditSink> = match settings.audit_channel {
        Some(channel) => Arc::new(ChannelAuditSink::new(Arc::new(mock.clone()), channel)),
        None => Arc::new(TracingAuditSink),
    };

    let warden = Warden::new(
        Arc::new(mock.clone()),
        audit,
        store,
        Arc::new(SystemClock),
        &settings,
    );

    let mut out = String::new();

    match warden.run_reconciliation_cycle().await {
        Ok(report) => {
            out.push_str("🧪 Reconciliation\n");
            for line in report.text().lines() {
                out.push_str(&format!("  {}\n", line));
            }
        }
        Err(e) => out.push_str(&format!("🧪 Reconciliation skipped: {}\n", e)),
    }

    let record = warden.run_reminder_cycle().await?;
    out.push_str(&format!(
        "🧪 Reminder sent as message {} at {}\n",
        record.last_reminder,
        record.sent_at().to_rfc3339()
    ));

    Ok(out)
}
