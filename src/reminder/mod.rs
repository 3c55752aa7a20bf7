//! Reminder module
//!
//! - Store: persisted id of the newest reminder
//! - Scheduler: resume-aware periodic re-posting

pub mod scheduler;
pub mod store;

pub use scheduler::{
    compute_initial_delay, default_reminder_message, ReminderError, ReminderRecord,
    ReminderScheduler, ReminderSettings,
};
pub use store::{ReminderStore, LAST_REMINDER_KEY};
