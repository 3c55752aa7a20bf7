//! Reaction fan-out and bounded waits
//!
//! The gateway listener publishes every reaction it sees into a
//! `ReactionHub`; confirmation prompts wait on a subscription filtered to
//! their own message and allowed tokens, raced against a hard timeout.

use super::traits::{MemberId, MessageId, ReactionEvent};
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of buffered reaction events per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast hub for reaction events
#[derive(Debug, Clone)]
pub struct ReactionHub {
    sender: broadcast::Sender<ReactionEvent>,
}

impl Default for ReactionHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ReactionHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a reaction to every current waiter.
    ///
    /// Returns how many waiters received it; zero is not an error.
    pub fn publish(&self, event: ReactionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Number of waiters currently subscribed.
    pub fn waiters(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Wait for the first qualifying reaction on `message`.
    ///
    /// The subscription is taken when this is called, not when the returned
    /// future is first polled, so events published between the two are not
    /// missed.
    pub fn await_one_of(
        &self,
        message: MessageId,
        allowed: &[String],
        timeout: Duration,
        exclude_bots: bool,
    ) -> impl Future<Output = Option<(String, MemberId)>> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        let allowed = allowed.to_vec();

        async move {
            let wait = async {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            if qualifies(&event, message, &allowed, exclude_bots) {
                                return Some((event.token, event.actor));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "reaction waiter lagged, some events were dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            };

            match tokio::time::timeout(timeout, wait).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(%message, "no qualifying reaction before timeout");
                    None
                }
            }
        }
    }
}

/// Whether `event` is a qualifying response to `message`.
fn qualifies(event: &ReactionEvent, message: MessageId, allowed: &[String], exclude_bots: bool) -> bool {
    event.message == message
        && allowed.iter().any(|token| *token == event.token)
        && !(exclude_bots && event.actor_is_bot)
}
