use crate::platform::MessageId;
use crate::store::{KeyValueStore, StoreResult};
use tracing::warn;

/// Key holding the id of the most recent reminder.
pub const LAST_REMINDER_KEY: &str = "last_reminder";

/// Typed view over the single "last reminder" entry
#[derive(Debug, Clone)]
pub struct ReminderStore<S> {
    inner: S,
}

impl<S: KeyValueStore> ReminderStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Id of the most recent reminder, if one was ever sent.
    ///
    /// A value that does not parse as an id is treated as absent.
    pub async fn load(&self) -> StoreResult<Option<MessageId>> {
        let Some(raw) = self.inner.get(LAST_REMINDER_KEY).await? else {
            return Ok(None);
        };
        match raw.parse::<MessageId>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                warn!(value = %raw, "Ignoring unreadable reminder id");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, id: MessageId) -> StoreResult<()> {
        self.inner.set(LAST_REMINDER_KEY, &id.to_string()).await
    }
}
