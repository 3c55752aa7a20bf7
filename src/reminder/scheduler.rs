//! Recurring reminder
//!
//! The reminder notice is re-posted every `frequency`. Only the newest notice
//! stays in the channel: the previous one is deleted before the next goes
//! out. The id of the newest notice is persisted, and because ids embed their
//! creation time a restarted process resumes the cadence instead of posting
//! immediately.

use super::store::ReminderStore;
use crate::clock::Clock;
use crate::platform::{timestamp_of, ChannelId, MessageId, NotificationChannel, PlatformError, RoleId};
use crate::shutdown::Shutdown;
use crate::store::{KeyValueStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Default period between reminders.
pub const DEFAULT_REMINDER_FREQUENCY: Duration = Duration::from_secs(28 * 60 * 60);

/// Reminder errors
#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Reminder store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to send reminder: {0}")]
    Send(#[source] PlatformError),
}

/// Reminder notice addressed to everyone holding `pending_role`.
pub fn default_reminder_message(pending_role: RoleId, removal_after_days: u64) -> String {
    format!(
        "{}\n\nWelcome! Please read the rules in this channel and accept them to gain \
         permission to send messages in the community!\n\n\
         You will be removed if you don't verify within `{}` days.",
        pending_role.mention(),
        removal_after_days
    )
}

/// How long to wait before the first reminder of this process.
///
/// With no previous reminder the answer is zero. Otherwise it is whatever is
/// left of `frequency` since the previous reminder was created, floored at
/// zero. A creation time in the future counts as "just sent".
pub fn compute_initial_delay(
    last_reminder: Option<MessageId>,
    frequency: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let Some(id) = last_reminder else {
        return Duration::ZERO;
    };
    let elapsed = (now - timestamp_of(id)).to_std().unwrap_or(Duration::ZERO);
    frequency.saturating_sub(elapsed)
}

/// Reminder settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSettings {
    pub channel: ChannelId,
    pub frequency: Duration,
    pub message: String,
}

/// Result of a reminder firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderRecord {
    pub last_reminder: MessageId,
}

impl ReminderRecord {
    pub fn sent_at(&self) -> DateTime<Utc> {
        timestamp_of(self.last_reminder)
    }
}

/// Posts the reminder on a fixed cadence
pub struct ReminderScheduler<N: ?Sized, S, C: ?Sized> {
    channel: Arc<N>,
    store: ReminderStore<S>,
    clock: Arc<C>,
    settings: ReminderSettings,
}

impl<N, S, C> ReminderScheduler<N, S, C>
where
    N: NotificationChannel + ?Sized,
    S: KeyValueStore,
    C: Clock + ?Sized,
{
    pub fn new(channel: Arc<N>, store: ReminderStore<S>, clock: Arc<C>, settings: ReminderSettings) -> Self {
        Self {
            channel,
            store,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ReminderSettings {
        &self.settings
    }

    /// Delay before the first firing, read from the persisted record.
    pub async fn initial_delay(&self) -> Result<Duration, ReminderError> {
        let last = self.store.load().await?;
        if last.is_none() {
            trace!("No previous reminder recorded, firing without delay");
        }
        let delay = compute_initial_delay(last, self.settings.frequency, self.clock.now());
        trace!(delay = %humantime::format_duration(delay), "Time until next reminder");
        Ok(delay)
    }

    /// Replace the previous reminder with a fresh one.
    ///
    /// The store is only updated after the new notice was sent.
    pub async fn fire(&self) -> Result<ReminderRecord, ReminderError> {
        let channel = self.settings.channel;

        if let Some(previous) = self.store.load().await? {
            debug!(message = %previous, "Deleting previous reminder");
            if let Err(e) = self.channel.delete(channel, previous).await {
                debug!(message = %previous, error = %e, "Previous reminder could not be deleted");
            }
        }

        let sent = self
            .channel
            .send(channel, &self.settings.message)
            .await
            .map_err(ReminderError::Send)?;
        self.store.save(sent).await?;

        info!(message = %sent, "Sent verification reminder");
        Ok(ReminderRecord {
            last_reminder: sent,
        })
    }

    /// Wait out the initial delay, then fire every `frequency` until
    /// `shutdown` fires.
    pub async fn run(&self, mut shutdown: Shutdown) {
        let delay = match self.initial_delay().await {
            Ok(delay) => delay,
            Err(e) => {
                warn!(error = %e, "Could not read reminder record, firing without delay");
                Duration::ZERO
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!("Reminder task stopped");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let mut ticker = tokio::time::interval(self.settings.frequency);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.fire().await {
                        warn!(error = %e, "Reminder not sent, retrying next period");
                    }
                }
            }
        }

        info!("Reminder task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::platform::MockPlatform;
    use crate::store::MemoryStore;
    use chrono::{Duration as TimeDelta, TimeZone};

    const CHANNEL: ChannelId = ChannelId(20);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn hours(h: u64) -> Duration {
        Duration::from_secs(h * 60 * 60)
    }

    fn scheduler(
        mock: &MockPlatform,
        store: MemoryStore,
    ) -> ReminderScheduler<MockPlatform, MemoryStore, FixedClock> {
        ReminderScheduler::new(
            Arc::new(mock.clone()),
            ReminderStore::new(store),
            Arc::new(FixedClock::new(now())),
            ReminderSettings {
                channel: CHANNEL,
                frequency: DEFAULT_REMINDER_FREQUENCY,
                message: default_reminder_message(RoleId(2), 30),
            },
        )
    }

    #[test]
    fn test_initial_delay_without_record_is_zero() {
        assert_eq!(
            compute_initial_delay(None, DEFAULT_REMINDER_FREQUENCY, now()),
            Duration::ZERO
        );
    }

    #[test]
    fn test_initial_delay_resumes_cadence() {
        let sent = now() - TimeDelta::hours(27);
        let id = MessageId::from_timestamp(sent, 0);

        assert_eq!(
            compute_initial_delay(Some(id), DEFAULT_REMINDER_FREQUENCY, now()),
            hours(1)
        );
    }

    #[test]
    fn test_initial_delay_overdue_is_zero() {
        let id = MessageId::from_timestamp(now() - TimeDelta::hours(50), 0);

        assert_eq!(
            compute_initial_delay(Some(id), DEFAULT_REMINDER_FREQUENCY, now()),
            Duration::ZERO
        );
    }

    #[test]
    fn test_initial_delay_future_record_waits_full_period() {
        let id = MessageId::from_timestamp(now() + TimeDelta::hours(2), 0);

        assert_eq!(
            compute_initial_delay(Some(id), DEFAULT_REMINDER_FREQUENCY, now()),
            DEFAULT_REMINDER_FREQUENCY
        );
    }

    #[test]
    fn test_default_message_mentions_role_and_horizon() {
        let text = default_reminder_message(RoleId(2), 30);
        assert!(text.starts_with("<@&2>"));
        assert!(text.contains("within `30` days"));
    }

    #[tokio::test]
    async fn test_fire_replaces_previous_reminder() {
        let mock = MockPlatform::new();
        mock.set_now(now());
        let store = MemoryStore::new();
        let scheduler = scheduler(&mock, store.clone());

        let first = scheduler.fire().await.unwrap();
        let second = scheduler.fire().await.unwrap();

        assert!(mock.message(first.last_reminder).unwrap().deleted);
        assert!(!mock.message(second.last_reminder).unwrap().deleted);
        assert_eq!(
            ReminderStore::new(store).load().await.unwrap(),
            Some(second.last_reminder)
        );
        assert_eq!(second.sent_at(), now());
    }

    #[tokio::test]
    async fn test_delete_failure_is_swallowed() {
        let mock = MockPlatform::new();
        let store = MemoryStore::new();
        let stale = mock.seed_message(CHANNEL, "old reminder", now() - TimeDelta::hours(30));
        ReminderStore::new(store.clone()).save(stale).await.unwrap();
        mock.fail_delete(true);

        let scheduler = scheduler(&mock, store);
        let record = scheduler.fire().await.unwrap();

        assert_ne!(record.last_reminder, stale);
        assert!(!mock.message(stale).unwrap().deleted);
    }

    #[tokio::test]
    async fn test_store_untouched_when_send_fails() {
        let mock = MockPlatform::new();
        let store = MemoryStore::new();
        let stale = mock.seed_message(CHANNEL, "old reminder", now() - TimeDelta::hours(30));
        ReminderStore::new(store.clone()).save(stale).await.unwrap();
        mock.fail_send(true);

        let scheduler = scheduler(&mock, store.clone());
        let err = scheduler.fire().await.unwrap_err();

        assert!(matches!(err, ReminderError::Send(_)));
        assert_eq!(ReminderStore::new(store).load().await.unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn test_initial_delay_reads_store() {
        let mock = MockPlatform::new();
        let store = MemoryStore::new();
        let previous = MessageId::from_timestamp(now() - TimeDelta::hours(27), 0);
        ReminderStore::new(store.clone()).save(previous).await.unwrap();

        let scheduler = scheduler(&mock, store);
        assert_eq!(scheduler.initial_delay().await.unwrap(), hours(1));
    }

    #[tokio::test]
    async fn test_run_fires_immediately_without_record_and_stops() {
        let mock = MockPlatform::new();
        let scheduler = scheduler(&mock, MemoryStore::new());
        let (handle, shutdown) = crate::shutdown::channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.trigger();
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(scheduler.run(shutdown), stopper);
        })
        .await
        .unwrap();

        assert_eq!(mock.messages_in(CHANNEL).len(), 1);
    }

    #[tokio::test]
    async fn test_run_waits_when_recently_sent() {
        let mock = MockPlatform::new();
        let store = MemoryStore::new();
        let previous = MessageId::from_timestamp(now() - TimeDelta::hours(1), 0);
        ReminderStore::new(store.clone()).save(previous).await.unwrap();
        let scheduler = scheduler(&mock, store);
        let (handle, shutdown) = crate::shutdown::channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.trigger();
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(scheduler.run(shutdown), stopper);
        })
        .await
        .unwrap();

        assert!(mock.messages_in(CHANNEL).is_empty());
    }
}
