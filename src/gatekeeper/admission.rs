//! Member admission
//!
//! Called by the command/listener layer when someone joins or accepts the
//! rules. Role changes are required; direct messages are best-effort since
//! members may have them disabled.

use crate::platform::{Member, MemberNotifier, PlatformResult, RoleId, RoleMutator};
use tracing::{debug, info};

/// Sent once a member joins.
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hello! Welcome to the community!\n\n\
In order to send messages, you first have to accept our rules. \
Please read them in the verification channel. Thank you!";

/// Sent once a member verifies.
pub const DEFAULT_VERIFIED_MESSAGE: &str = "Thanks for verifying yourself!\n\n\
You can now send messages in the community. Welcome aboard!";

/// Admission settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionSettings {
    pub verified_role: RoleId,
    pub pending_role: RoleId,
    pub welcome_message: String,
    pub verified_message: String,
}

impl AdmissionSettings {
    pub fn new(verified_role: RoleId, pending_role: RoleId) -> Self {
        Self {
            verified_role,
            pending_role,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            verified_message: DEFAULT_VERIFIED_MESSAGE.to_string(),
        }
    }
}

/// Mark `member` as verified.
///
/// Adds the verified role, drops the pending role if held, then tries to
/// thank the member privately.
pub async fn accept_member<P>(platform: &P, settings: &AdmissionSettings, member: &Member) -> PlatformResult<()>
where
    P: RoleMutator + MemberNotifier + ?Sized,
{
    debug!(member = %member.id, "Accepting member");

    platform
        .add_role(member.id, settings.verified_role, "Accepted the rules")
        .await?;

    if member.has_role(settings.pending_role) {
        platform
            .remove_role(member.id, settings.pending_role, "Accepted the rules")
            .await?;
    }

    if let Err(e) = platform.send_direct(member.id, &settings.verified_message).await {
        info!(member = %member.id, error = %e, "Failed to send verification confirmation");
    }

    Ok(())
}

/// Greet a newly joined member. Never fails.
pub async fn welcome_member<P>(platform: &P, settings: &AdmissionSettings, member: &Member)
where
    P: MemberNotifier + ?Sized,
{
    if member.bot {
        return;
    }
    if let Err(e) = platform.send_direct(member.id, &settings.welcome_message).await {
        info!(member = %member.id, error = %e, "Failed to send welcome message");
    }
}
