use super::{load_config, logging};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;
use warden::config::Settings;
use warden::gatekeeper::classifier::{classify, ActionBatch};
use warden::gatekeeper::confirmation::{removal_fraction, requires_confirmation};
use warden::platform::Member;
use warden::snapshot::load_snapshot;

/// Dry-run classification of a snapshot file
///
/// Prints who would receive the pending role and who would be removed, and
/// whether the removal would need reviewer confirmation. Nothing is changed.
pub fn execute(
    members: String,
    config: Option<String>,
    now: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, config) = load_config(config)?;
    logging::init(&config.logging)?;
    let settings = config.settings()?;

    let snapshot = load_snapshot(Path::new(&members))?;
    let now = match now {
        Some(raw) => parse_now(&raw)?,
        None => Utc::now(),
    };

    print!("{}", render(&snapshot, now, &settings));
    Ok(())
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| format!("Invalid --now '{}': {}", raw, e))?;
    Ok(parsed.with_timezone(&Utc))
}

fn list(batch: &ActionBatch) -> String {
    if batch.is_empty() {
        return "  (none)\n".to_string();
    }
    batch
        .members()
        .iter()
        .map(|id| format!("  {}\n", id))
        .collect()
}

fn render(snapshot: &[Member], now: DateTime<Utc>, settings: &Settings) -> String {
    let policy = &settings.reconcile.policy;
    let result = classify(snapshot, now, policy);
    let removal = &result.needs_removal;

    let mut out = String::new();
    let _ = writeln!(out, "🔍 {} members as of {}", snapshot.len(), now.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Pending role {} after {} days: {} members",
        policy.pending_role.mention(),
        policy.warning_after_days(),
        result.needs_warning.len()
    );
    out.push_str(&list(&result.needs_warning));
    let _ = writeln!(
        out,
        "Removal after {} days: {} members",
        policy.removal_after_days(),
        removal.len()
    );
    out.push_str(&list(removal));

    if !removal.is_empty() {
        let fraction = removal_fraction(removal.len(), snapshot.len());
        let gate = if requires_confirmation(removal.len(), snapshot.len(), settings.reconcile.gate.threshold) {
            "reviewer confirmation required"
        } else {
            "automatic"
        };
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Removal covers {:.2}% of the population: {}",
            fraction * 100.0,
            gate
        );
    }

    out
}
