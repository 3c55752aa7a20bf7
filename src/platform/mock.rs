//! Mock Platform for Testing
//!
//! In-memory stand-in for the chat platform. Role changes and removals are
//! applied to the mock's own member table, so a second snapshot observes the
//! effects of the first cycle. Failures and human reactions are scripted.

use super::reactions::ReactionHub;
use super::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Mock platform
#[derive(Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
    hub: ReactionHub,
}

struct MockState {
    now: DateTime<Utc>,
    next_sequence: u64,
    members: BTreeMap<MemberId, Member>,
    snapshot_error: Option<PlatformError>,
    role_failures: HashMap<MemberId, ErrorCode>,
    kick_failures: HashMap<MemberId, ErrorCode>,
    direct_failures: HashSet<MemberId>,
    fail_delete: bool,
    fail_send: bool,
    messages: BTreeMap<MessageId, PostedMessage>,
    scripted_reactions: Vec<ScriptedReaction>,
    await_calls: usize,
    reports: Vec<AuditReport>,
    direct_messages: Vec<(MemberId, String)>,
    kicked: Vec<MemberId>,
}

/// A message posted through the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub id: MessageId,
    pub channel: ChannelId,
    pub content: String,
    pub reactions: Vec<String>,
    pub deleted: bool,
    pub edited: bool,
}

/// A report received by the mock audit sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub title: String,
    pub text: String,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
struct ScriptedReaction {
    token: String,
    actor: MemberId,
    actor_is_bot: bool,
    on_prompt: bool,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create an empty mock whose clock reads the current time.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                now: Utc::now(),
                next_sequence: 0,
                members: BTreeMap::new(),
                snapshot_error: None,
                role_failures: HashMap::new(),
                kick_failures: HashMap::new(),
                direct_failures: HashSet::new(),
                fail_delete: false,
                fail_send: false,
                messages: BTreeMap::new(),
                scripted_reactions: Vec::new(),
                await_calls: 0,
                reports: Vec::new(),
                direct_messages: Vec::new(),
                kicked: Vec::new(),
            })),
            hub: ReactionHub::default(),
        }
    }

    /// Create a mock pre-populated with `members`.
    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        let mock = Self::new();
        for member in members {
            mock.add_member(member);
        }
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reaction hub the mock publishes scripted reactions into.
    pub fn hub(&self) -> &ReactionHub {
        &self.hub
    }

    /// Set the time used to mint new message ids.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state().now = now;
    }

    pub fn add_member(&self, member: Member) {
        self.state().members.insert(member.id, member);
    }

    pub fn member(&self, id: MemberId) -> Option<Member> {
        self.state().members.get(&id).cloned()
    }

    /// Make `list_members` and `member_count` fail until cleared.
    pub fn fail_snapshot(&self, error: Option<PlatformError>) {
        self.state().snapshot_error = error;
    }

    pub fn fail_role_for(&self, member: MemberId, code: ErrorCode) {
        self.state().role_failures.insert(member, code);
    }

    pub fn fail_kick_for(&self, member: MemberId, code: ErrorCode) {
        self.state().kick_failures.insert(member, code);
    }

    pub fn fail_direct_for(&self, member: MemberId) {
        self.state().direct_failures.insert(member);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    pub fn fail_send(&self, fail: bool) {
        self.state().fail_send = fail;
    }

    /// Queue a reaction to be delivered to the next prompt that is awaited.
    pub fn script_reaction(&self, token: &str, actor: MemberId, actor_is_bot: bool) {
        self.state().scripted_reactions.push(ScriptedReaction {
            token: token.to_string(),
            actor,
            actor_is_bot,
            on_prompt: true,
        });
    }

    /// Queue a reaction that lands on some other message.
    pub fn script_stray_reaction(&self, token: &str, actor: MemberId) {
        self.state().scripted_reactions.push(ScriptedReaction {
            token: token.to_string(),
            actor,
            actor_is_bot: false,
            on_prompt: false,
        });
    }

    /// Post a message directly, bypassing `fail_send`.
    pub fn seed_message(&self, channel: ChannelId, content: &str, at: DateTime<Utc>) -> MessageId {
        let mut state = self.state();
        let id = MessageId::from_timestamp(at, state.next_sequence);
        state.next_sequence += 1;
        state.messages.insert(
            id,
            PostedMessage {
                id,
                channel,
                content: content.to_string(),
                reactions: Vec::new(),
                deleted: false,
                edited: false,
            },
        );
        id
    }

    pub fn message(&self, id: MessageId) -> Option<PostedMessage> {
        self.state().messages.get(&id).cloned()
    }

    /// Messages posted to `channel`, oldest first.
    pub fn messages_in(&self, channel: ChannelId) -> Vec<PostedMessage> {
        self.state()
            .messages
            .values()
            .filter(|msg| msg.channel == channel)
            .cloned()
            .collect()
    }

    pub fn await_calls(&self) -> usize {
        self.state().await_calls
    }

    pub fn reports(&self) -> Vec<AuditReport> {
        self.state().reports.clone()
    }

    pub fn direct_messages(&self) -> Vec<(MemberId, String)> {
        self.state().direct_messages.clone()
    }

    pub fn kicked(&self) -> Vec<MemberId> {
        self.state().kicked.clone()
    }
}

#[async_trait]
impl MembershipProvider for MockPlatform {
    async fn list_members(&self) -> PlatformResult<Vec<Member>> {
        let state = self.state();
        if let Some(err) = &state.snapshot_error {
            return Err(err.clone());
        }
        Ok(state.members.values().cloned().collect())
    }

    async fn member_count(&self) -> PlatformResult<usize> {
        let state = self.state();
        if let Some(err) = &state.snapshot_error {
            return Err(err.clone());
        }
        Ok(state.members.len())
    }
}

#[async_trait]
impl RoleMutator for MockPlatform {
    async fn add_role(&self, member: MemberId, role: RoleId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state();
        if let Some(code) = state.role_failures.get(&member) {
            return Err(PlatformError::new(*code, format!("add role {} to {}", role, member)));
        }
        let entry = state
            .members
            .get_mut(&member)
            .ok_or_else(|| PlatformError::not_found(format!("unknown member {}", member)))?;
        entry.roles.insert(role);
        Ok(())
    }

    async fn remove_role(
        &self,
        member: MemberId,
        role: RoleId,
        _reason: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        if let Some(code) = state.role_failures.get(&member) {
            return Err(PlatformError::new(*code, format!("remove role {} from {}", role, member)));
        }
        let entry = state
            .members
            .get_mut(&member)
            .ok_or_else(|| PlatformError::not_found(format!("unknown member {}", member)))?;
        entry.roles.remove(&role);
        Ok(())
    }
}

#[async_trait]
impl GuildActions for MockPlatform {
    async fn kick(&self, member: MemberId, _reason: &str) -> PlatformResult<()> {
        let mut state = self.state();
        if let Some(code) = state.kick_failures.get(&member) {
            return Err(PlatformError::new(*code, format!("kick {}", member)));
        }
        if state.members.remove(&member).is_none() {
            return Err(PlatformError::not_found(format!("unknown member {}", member)));
        }
        state.kicked.push(member);
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for MockPlatform {
    async fn send(&self, channel: ChannelId, text: &str) -> PlatformResult<MessageId> {
        let now = {
            let state = self.state();
            if state.fail_send {
                return Err(PlatformError::unavailable("send failed"));
            }
            state.now
        };
        Ok(self.seed_message(channel, text, now))
    }

    async fn delete(&self, _channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        let mut state = self.state();
        if state.fail_delete {
            return Err(PlatformError::new(ErrorCode::Http(500), "delete failed"));
        }
        match state.messages.get_mut(&message) {
            Some(msg) if !msg.deleted => {
                msg.deleted = true;
                Ok(())
            }
            _ => Err(PlatformError::not_found(format!("unknown message {}", message))),
        }
    }

    async fn edit_content(
        &self,
        _channel: ChannelId,
        message: MessageId,
        text: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        let msg = state
            .messages
            .get_mut(&message)
            .ok_or_else(|| PlatformError::not_found(format!("unknown message {}", message)))?;
        msg.content = text.to_string();
        msg.edited = true;
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        token: &str,
    ) -> PlatformResult<()> {
        let mut state = self.state();
        let msg = state
            .messages
            .get_mut(&message)
            .ok_or_else(|| PlatformError::not_found(format!("unknown message {}", message)))?;
        msg.reactions.push(token.to_string());
        Ok(())
    }

    async fn clear_reactions(&self, _channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        let mut state = self.state();
        let msg = state
            .messages
            .get_mut(&message)
            .ok_or_else(|| PlatformError::not_found(format!("unknown message {}", message)))?;
        msg.reactions.clear();
        Ok(())
    }
}

#[async_trait]
impl ReactionAwaiter for MockPlatform {
    async fn await_one_of(
        &self,
        message: MessageId,
        allowed: &[String],
        timeout: Duration,
        exclude_bots: bool,
    ) -> Option<(String, MemberId)> {
        let scripted = {
            let mut state = self.state();
            state.await_calls += 1;
            std::mem::take(&mut state.scripted_reactions)
        };

        let wait = self.hub.await_one_of(message, allowed, timeout, exclude_bots);
        for reaction in scripted {
            let target = if reaction.on_prompt {
                message
            } else {
                MessageId(message.0.wrapping_add(1))
            };
            self.hub.publish(ReactionEvent {
                message: target,
                token: reaction.token,
                actor: reaction.actor,
                actor_is_bot: reaction.actor_is_bot,
            });
        }
        wait.await
    }
}

#[async_trait]
impl MemberNotifier for MockPlatform {
    async fn send_direct(&self, member: MemberId, text: &str) -> PlatformResult<()> {
        let mut state = self.state();
        if state.direct_failures.contains(&member) {
            return Err(PlatformError::forbidden("direct messages disabled"));
        }
        state.direct_messages.push((member, text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MockPlatform {
    async fn report(&self, title: &str, text: &str, severity: Severity) -> PlatformResult<()> {
        self.state().reports.push(AuditReport {
            title: title.to_string(),
            text: text.to_string(),
            severity,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u64) -> Member {
        Member {
            id: MemberId(id),
            joined_at: Some(Utc::now()),
            roles: Default::default(),
            bot: false,
        }
    }

    #[tokio::test]
    async fn test_role_changes_are_visible_in_next_snapshot() {
        let mock = MockPlatform::with_members([member(1)]);

        mock.add_role(MemberId(1), RoleId(9), "test").await.unwrap();

        let snapshot = mock.list_members().await.unwrap();
        assert!(snapshot[0].has_role(RoleId(9)));

        mock.remove_role(MemberId(1), RoleId(9), "test").await.unwrap();
        assert!(!mock.member(MemberId(1)).unwrap().has_role(RoleId(9)));
    }

    #[tokio::test]
    async fn test_kick_removes_member() {
        let mock = MockPlatform::with_members([member(1), member(2)]);

        mock.kick(MemberId(1), "test").await.unwrap();

        assert_eq!(mock.member_count().await.unwrap(), 1);
        assert_eq!(mock.kicked(), vec![MemberId(1)]);
        assert_eq!(
            mock.kick(MemberId(1), "again").await.unwrap_err().code,
            ErrorCode::NotFound
        );
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mock = MockPlatform::with_members([member(1)]);
        mock.fail_role_for(MemberId(1), ErrorCode::Forbidden);
        mock.fail_snapshot(Some(PlatformError::unavailable("gateway down")));

        let err = mock.add_role(MemberId(1), RoleId(9), "test").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
        assert!(mock.list_members().await.is_err());

        mock.fail_snapshot(None);
        assert!(mock.list_members().await.is_ok());
    }

    #[tokio::test]
    async fn test_messages_and_reactions() {
        let mock = MockPlatform::new();
        let channel = ChannelId(5);

        let id = mock.send(channel, "hello").await.unwrap();
        mock.add_reaction(channel, id, "approve").await.unwrap();
        mock.edit_content(channel, id, "edited").await.unwrap();

        let msg = mock.message(id).unwrap();
        assert_eq!(msg.content, "edited");
        assert_eq!(msg.reactions, vec!["approve".to_string()]);

        mock.clear_reactions(channel, id).await.unwrap();
        mock.delete(channel, id).await.unwrap();

        let msg = mock.message(id).unwrap();
        assert!(msg.reactions.is_empty());
        assert!(msg.deleted);
        assert!(mock.delete(channel, id).await.is_err());
    }

    #[tokio::test]
    async fn test_message_ids_carry_mock_time() {
        let mock = MockPlatform::new();
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        mock.set_now(at);

        let id = mock.send(ChannelId(1), "reminder").await.unwrap();
        assert_eq!(id.created_at(), at);
    }

    #[tokio::test]
    async fn test_scripted_reaction_is_delivered() {
        let mock = MockPlatform::new();
        let prompt = mock.send(ChannelId(1), "proceed?").await.unwrap();
        mock.script_stray_reaction("approve", MemberId(3));
        mock.script_reaction("deny", MemberId(4), false);

        let allowed = vec!["approve".to_string(), "deny".to_string()];
        let result = mock
            .await_one_of(prompt, &allowed, Duration::from_secs(1), true)
            .await;

        assert_eq!(result, Some(("deny".to_string(), MemberId(4))));
        assert_eq!(mock.await_calls(), 1);
    }

    #[tokio::test]
    async fn test_direct_message_failure() {
        let mock = MockPlatform::new();
        mock.fail_direct_for(MemberId(2));

        mock.send_direct(MemberId(1), "hi").await.unwrap();
        assert!(mock.send_direct(MemberId(2), "hi").await.is_err());
        assert_eq!(mock.direct_messages().len(), 1);
    }
}
