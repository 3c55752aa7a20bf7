//! Platform Integration Module
//!
//! Boundary between the moderation core and the chat platform:
//! - Immutable value types (Member, MemberId, RoleId, MessageId)
//! - Async capability traits the core is generic over
//! - Reaction fan-out for confirmation prompts
//! - MockPlatform for tests and offline simulation

pub mod audit;
pub mod mock;
pub mod reactions;
pub mod snowflake;
pub mod traits;

pub use audit::{ChannelAuditSink, TracingAuditSink};
pub use mock::MockPlatform;
pub use reactions::ReactionHub;
pub use snowflake::{timestamp_of, MessageId};
pub use traits::{
    AuditSink, ChannelId, ErrorCode, GuildActions, Member, MemberId, MemberNotifier,
    MembershipProvider, NotificationChannel, Platform, PlatformError, PlatformResult,
    ReactionAwaiter, ReactionEvent, RoleId, RoleMutator, Severity,
};
