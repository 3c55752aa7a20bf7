//! Platform Capability Traits
//!
//! The moderation core never touches platform-native objects. Everything it
//! needs from the chat platform goes through these traits and the immutable
//! value types below, which lets every cycle run against `MockPlatform`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

pub use super::snowflake::MessageId;

/// Member (user) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub u64);

/// Role identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub u64);

/// Channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RoleId {
    /// Mention markup for this role.
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}

/// Point-in-time view of one member.
///
/// `joined_at` is `None` when the platform could not report a join date;
/// such members are never acted upon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    #[serde(default)]
    pub bot: bool,
}

impl Member {
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// Classification of a failed platform call.
///
/// Ordered so aggregated failure sets print deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCode {
    RateLimited,
    Forbidden,
    NotFound,
    Unavailable,
    Http(u16),
    Other,
}

impl ErrorCode {
    /// Map an HTTP status onto an error code.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ErrorCode::RateLimited,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            502..=504 => ErrorCode::Unavailable,
            _ => ErrorCode::Http(status),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::RateLimited => write!(f, "rate-limited"),
            ErrorCode::Forbidden => write!(f, "forbidden"),
            ErrorCode::NotFound => write!(f, "not-found"),
            ErrorCode::Unavailable => write!(f, "unavailable"),
            ErrorCode::Http(status) => write!(f, "http-{}", status),
            ErrorCode::Other => write!(f, "other"),
        }
    }
}

/// Error returned by any platform call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct PlatformError {
    pub code: ErrorCode,
    pub message: String,
}

impl PlatformError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Severity of an audit report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Alert,
}

/// A reaction added to a message, as delivered by the platform gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message: MessageId,
    pub token: String,
    pub actor: MemberId,
    pub actor_is_bot: bool,
}

/// Source of member snapshots
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Fresh snapshot of every member.
    async fn list_members(&self) -> PlatformResult<Vec<Member>>;

    /// Total population, bots included.
    async fn member_count(&self) -> PlatformResult<usize>;
}

/// Role mutation
#[async_trait]
pub trait RoleMutator: Send + Sync {
    async fn add_role(&self, member: MemberId, role: RoleId, reason: &str) -> PlatformResult<()>;

    async fn remove_role(&self, member: MemberId, role: RoleId, reason: &str)
        -> PlatformResult<()>;
}

/// Community-level moderation actions
#[async_trait]
pub trait GuildActions: Send + Sync {
    /// Remove a member from the community.
    async fn kick(&self, member: MemberId, reason: &str) -> PlatformResult<()>;
}

/// Channel messaging
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Post a message, returning its id.
    async fn send(&self, channel: ChannelId, text: &str) -> PlatformResult<MessageId>;

    async fn delete(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()>;

    async fn edit_content(
        &self,
        channel: ChannelId,
        message: MessageId,
        text: &str,
    ) -> PlatformResult<()>;

    /// Attach a reaction (response affordance) to a message.
    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        token: &str,
    ) -> PlatformResult<()>;

    /// Remove every reaction from a message.
    async fn clear_reactions(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()>;
}

/// Waits for a qualifying reaction on a message
#[async_trait]
pub trait ReactionAwaiter: Send + Sync {
    /// Wait up to `timeout` for the first reaction on `message` whose token is
    /// in `allowed`. Bot reactions are ignored when `exclude_bots` is set.
    ///
    /// Returns `(token, actor)` or `None` on timeout.
    async fn await_one_of(
        &self,
        message: MessageId,
        allowed: &[String],
        timeout: Duration,
        exclude_bots: bool,
    ) -> Option<(String, MemberId)>;
}

/// Direct messages to individual members
#[async_trait]
pub trait MemberNotifier: Send + Sync {
    async fn send_direct(&self, member: MemberId, text: &str) -> PlatformResult<()>;
}

/// Destination for moderation reports
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn report(&self, title: &str, text: &str, severity: Severity) -> PlatformResult<()>;
}

/// Everything the reconciliation and reminder cycles need from a platform.
pub trait Platform:
    MembershipProvider
    + RoleMutator
    + GuildActions
    + NotificationChannel
    + ReactionAwaiter
    + MemberNotifier
{
}

impl<T> Platform for T where
    T: MembershipProvider
        + RoleMutator
        + GuildActions
        + NotificationChannel
        + ReactionAwaiter
        + MemberNotifier
{
}
