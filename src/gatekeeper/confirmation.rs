//! Confirmation gate for removal batches
//!
//! A removal batch that is a small enough share of the population proceeds
//! on its own. Anything at or above the threshold is put to the reviewers:
//! a prompt is posted with approve/deny reactions and the gate waits for one
//! human answer, bounded by a hard timeout. Whatever happens, the prompt's
//! reactions are cleared and its text is edited to record the outcome.
//!
//! A threshold of `0.0` sends every non-empty batch to the reviewers.

use crate::platform::{ChannelId, NotificationChannel, ReactionAwaiter, RoleId};
use crate::platform::PlatformResult;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default time reviewers have to answer a prompt.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default approve reaction.
pub const DEFAULT_APPROVE_TOKEN: &str = "✅";

/// Default deny reaction.
pub const DEFAULT_DENY_TOKEN: &str = "❌";

/// Outcome of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    AutoApproved,
    HumanApproved,
    HumanDenied,
    TimedOut,
}

impl ConfirmationDecision {
    /// Whether the batch may be executed.
    pub fn permits_execution(self) -> bool {
        matches!(
            self,
            ConfirmationDecision::AutoApproved | ConfirmationDecision::HumanApproved
        )
    }
}

impl fmt::Display for ConfirmationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConfirmationDecision::AutoApproved => "auto-approved",
            ConfirmationDecision::HumanApproved => "authorized",
            ConfirmationDecision::HumanDenied => "denied",
            ConfirmationDecision::TimedOut => "not answered",
        };
        f.write_str(text)
    }
}

/// Gate settings
#[derive(Debug, Clone, PartialEq)]
pub struct GateSettings {
    /// Share of the population, in `[0, 1]`, below which removal is automatic.
    pub threshold: f64,
    pub timeout: Duration,
    pub review_channel: ChannelId,
    /// Role mentioned at the start of the prompt, if any.
    pub reviewer_role: Option<RoleId>,
    pub approve_token: String,
    pub deny_token: String,
}

/// Share of the population a batch represents.
///
/// An empty population counts as the whole population.
pub fn removal_fraction(candidate_count: usize, total_member_count: usize) -> f64 {
    if total_member_count == 0 {
        return 1.0;
    }
    candidate_count as f64 / total_member_count as f64
}

/// Whether a batch of this size needs a human answer.
pub fn requires_confirmation(candidate_count: usize, total_member_count: usize, threshold: f64) -> bool {
    removal_fraction(candidate_count, total_member_count) >= threshold
}

/// Confirmation gate bound to a platform
pub struct ConfirmationGate<'a, P: ?Sized> {
    platform: &'a P,
    settings: &'a GateSettings,
}

impl<'a, P> ConfirmationGate<'a, P>
where
    P: NotificationChannel + ReactionAwaiter + ?Sized,
{
    pub fn new(platform: &'a P, settings: &'a GateSettings) -> Self {
        Self { platform, settings }
    }

    /// Decide whether `candidate_count` removals may proceed.
    ///
    /// `removal_after_days` only feeds the prompt text. Errors mean the
    /// prompt could not be posted; callers treat that as a veto.
    pub async fn authorize(
        &self,
        candidate_count: usize,
        total_member_count: usize,
        removal_after_days: u64,
    ) -> PlatformResult<ConfirmationDecision> {
        debug!("Checking whether {} members are safe to remove", candidate_count);

        let fraction = removal_fraction(candidate_count, total_member_count);
        if !requires_confirmation(candidate_count, total_member_count, self.settings.threshold) {
            debug!(
                "Removing {:.2}% of the population is seen as safe",
                fraction * 100.0
            );
            return Ok(ConfirmationDecision::AutoApproved);
        }

        debug!("Amount of members is too large, requesting reviewer confirmation");

        let channel = self.settings.review_channel;
        let prompt = self
            .platform
            .send(
                channel,
                &self.prompt_text(candidate_count, fraction, removal_after_days),
            )
            .await?;

        let allowed = vec![
            self.settings.approve_token.clone(),
            self.settings.deny_token.clone(),
        ];
        for token in &allowed {
            if let Err(e) = self.platform.add_reaction(channel, prompt, token).await {
                debug!(token = %token, error = %e, "failed to attach response reaction");
            }
        }

        let answer = self
            .platform
            .await_one_of(prompt, &allowed, self.settings.timeout, true)
            .await;

        if let Err(e) = self.platform.clear_reactions(channel, prompt).await {
            debug!(error = %e, "failed to clear prompt reactions");
        }

        let decision = match answer {
            Some((token, actor)) => {
                let approved = token == self.settings.approve_token;
                debug!(actor = %actor, "Received answer: {}, result: {}", token, approved);
                if approved {
                    ConfirmationDecision::HumanApproved
                } else {
                    ConfirmationDecision::HumanDenied
                }
            }
            None => {
                debug!("Reviewer prompt not answered, aborting operation");
                ConfirmationDecision::TimedOut
            }
        };

        let outcome = format!(
            "Request to remove `{}` members was {}!",
            candidate_count, decision
        );
        if let Err(e) = self.platform.edit_content(channel, prompt, &outcome).await {
            debug!(error = %e, "failed to edit prompt with final outcome");
        }

        Ok(decision)
    }

    fn prompt_text(&self, candidate_count: usize, fraction: f64, removal_after_days: u64) -> String {
        let mention = self
            .settings
            .reviewer_role
            .map(|role| format!("{} ", role.mention()))
            .unwrap_or_default();
        format!(
            "{}Verification determined that `{}` members should be removed as they haven't \
             verified in `{}` days. This is `{:.2}%` of the community's population. Proceed?",
            mention,
            candidate_count,
            removal_after_days,
            fraction * 100.0
        )
    }
}
