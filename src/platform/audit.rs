//! Audit sinks
//!
//! `TracingAuditSink` writes reports to the process log and is used when no
//! platform log channel is wired up (dry runs, simulation).
//! `ChannelAuditSink` additionally mirrors each report into a channel.

use super::traits::{AuditSink, ChannelId, NotificationChannel, PlatformResult, Severity};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Renders audit reports as structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn report(&self, title: &str, text: &str, severity: Severity) -> PlatformResult<()> {
        for line in text.lines() {
            match severity {
                Severity::Info => info!(target: "warden::audit", title, "{}", line),
                Severity::Warning => warn!(target: "warden::audit", title, "{}", line),
                Severity::Alert => error!(target: "warden::audit", title, "{}", line),
            }
        }
        Ok(())
    }
}

/// Logs every report, then posts it to a channel.
pub struct ChannelAuditSink<N: ?Sized> {
    notifier: Arc<N>,
    channel: ChannelId,
}

impl<N: NotificationChannel + ?Sized> ChannelAuditSink<N> {
    pub fn new(notifier: Arc<N>, channel: ChannelId) -> Self {
        Self { notifier, channel }
    }

    fn render(title: &str, text: &str, severity: Severity) -> String {
        match severity {
            Severity::Alert => format!("@here\n**{}**\n{}", title, text),
            Severity::Info | Severity::Warning => format!("**{}**\n{}", title, text),
        }
    }
}

#[async_trait]
impl<N: NotificationChannel + ?Sized> AuditSink for ChannelAuditSink<N> {
    async fn report(&self, title: &str, text: &str, severity: Severity) -> PlatformResult<()> {
        TracingAuditSink.report(title, text, severity).await?;
        self.notifier
            .send(self.channel, &Self::render(title, text, severity))
            .await?;
        Ok(())
    }
}
