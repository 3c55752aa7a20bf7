//! Warden service
//!
//! Owns the two independent periodic tasks, reconciliation and reminder, and
//! runs them side by side on the current runtime until shutdown.

use crate::clock::Clock;
use crate::config::Settings;
use crate::gatekeeper::{CycleError, CycleReport, Reconciler};
use crate::platform::{AuditSink, Platform};
use crate::reminder::{ReminderError, ReminderRecord, ReminderScheduler, ReminderStore};
use crate::shutdown::Shutdown;
use crate::store::KeyValueStore;
use std::sync::Arc;
use tracing::info;

/// Verification service
pub struct Warden<P: ?Sized, A: ?Sized, S, C: ?Sized> {
    reconciler: Reconciler<P, A, C>,
    reminder: ReminderScheduler<P, S, C>,
}

impl<P, A, S, C> Warden<P, A, S, C>
where
    P: Platform + ?Sized,
    A: AuditSink + ?Sized,
    S: KeyValueStore,
    C: Clock + ?Sized,
{
    pub fn new(platform: Arc<P>, audit: Arc<A>, store: S, clock: Arc<C>, settings: &Settings) -> Self {
        Self {
            reconciler: Reconciler::new(
                Arc::clone(&platform),
                audit,
                Arc::clone(&clock),
                settings.reconcile.clone(),
            ),
            reminder: ReminderScheduler::new(
                platform,
                ReminderStore::new(store),
                clock,
                settings.reminder.clone(),
            ),
        }
    }

    /// One reconciliation pass. Idempotent.
    pub async fn run_reconciliation_cycle(&self) -> Result<CycleReport, CycleError> {
        self.reconciler.run_cycle().await
    }

    /// Replace the reminder now, regardless of cadence.
    pub async fn run_reminder_cycle(&self) -> Result<ReminderRecord, ReminderError> {
        self.reminder.fire().await
    }

    pub fn reconciler(&self) -> &Reconciler<P, A, C> {
        &self.reconciler
    }

    pub fn reminder(&self) -> &ReminderScheduler<P, S, C> {
        &self.reminder
    }

    /// Run both periodic tasks until `shutdown` fires.
    pub async fn run(&self, shutdown: Shutdown) {
        info!("Starting verification service");
        tokio::join!(
            self.reconciler.run(shutdown.clone()),
            self.reminder.run(shutdown)
        );
        info!("Verification service stopped");
    }
}
