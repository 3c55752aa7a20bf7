use super::load_config;
use chrono::{DateTime, Utc};
use std::time::Duration;
use warden::platform::MessageId;
use warden::reminder::{compute_initial_delay, ReminderStore};
use warden::store::SqliteStore;

/// Show the stored reminder and when the next one is due
pub async fn execute(config: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (_, config) = load_config(config)?;
    let settings = config.settings()?;

    println!("📊 Reminder status");
    println!("Store: {}", settings.store_path.display());
    println!();

    if !settings.store_path.exists() {
        println!("No store yet, the first reminder goes out immediately.");
        return Ok(());
    }

    let store = SqliteStore::open(&settings.store_path).await?;
    let last = ReminderStore::new(store).load().await?;
    print!("{}", render(last, settings.reminder.frequency, Utc::now()));
    Ok(())
}

fn render(last: Option<MessageId>, frequency: Duration, now: DateTime<Utc>) -> String {
    let Some(id) = last else {
        return "No reminder recorded, the next one goes out immediately.\n".to_string();
    };

    let delay = compute_initial_delay(Some(id), frequency, now);
    let due = if delay.is_zero() {
        "now".to_string()
    } else {
        format!("in {}", humantime::format_duration(delay))
    };

    format!(
        "Last reminder: {}\nSent at: {}\nNext reminder: {}\n",
        id,
        id.created_at().to_rfc3339(),
        due
    )
}
