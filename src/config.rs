//! Warden configuration file handling
//!
//! Configuration is a TOML file. Durations are human-readable strings
//! ("3days", "28h", "5m") parsed with `humantime`. `WardenConfig` mirrors the
//! file; `Settings` is the validated form the service runs on.

use crate::gatekeeper::admission::AdmissionSettings;
use crate::gatekeeper::classifier::Policy;
use crate::gatekeeper::confirmation::{GateSettings, DEFAULT_APPROVE_TOKEN, DEFAULT_DENY_TOKEN};
use crate::gatekeeper::reconcile::ReconcileSettings;
use crate::platform::{ChannelId, RoleId};
use crate::reminder::{default_reminder_message, ReminderSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid duration for '{field}': {source}")]
    Duration {
        field: &'static str,
        #[source]
        source: humantime::DurationError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Warden configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardenConfig {
    pub guild: GuildConfig,

    pub roles: RolesConfig,

    pub channels: ChannelsConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub reminder: ReminderConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Community id; doubles as the id of the role every member holds
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesConfig {
    /// Role marking members that have not verified yet
    pub pending: u64,

    /// Roles that do not count as verification (the guild role is implied)
    #[serde(default)]
    pub baseline: Vec<u64>,

    /// Role granted on acceptance
    pub verified: u64,

    /// Role mentioned on confirmation prompts
    #[serde(default)]
    pub reviewers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Where confirmation prompts are posted
    pub review: u64,

    /// Where the recurring reminder is posted
    pub reminder: u64,

    /// Where reports are mirrored, if anywhere
    #[serde(default)]
    pub audit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_warning_after")]
    pub warning_after: String,

    #[serde(default = "default_removal_after")]
    pub removal_after: String,

    /// Share of the population, in [0, 1], below which removal is automatic
    #[serde(default)]
    pub confirmation_threshold: f64,

    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout: String,

    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval: String,

    #[serde(default = "default_approve_token")]
    pub approve_token: String,

    #[serde(default = "default_deny_token")]
    pub deny_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_reminder_frequency")]
    pub frequency: String,

    /// Overrides the built-in reminder text
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_warning_after() -> String {
    "3days".to_string()
}

fn default_removal_after() -> String {
    "30days".to_string()
}

fn default_confirmation_timeout() -> String {
    "5m".to_string()
}

fn default_reconcile_interval() -> String {
    "30m".to_string()
}

fn default_approve_token() -> String {
    DEFAULT_APPROVE_TOKEN.to_string()
}

fn default_deny_token() -> String {
    DEFAULT_DENY_TOKEN.to_string()
}

fn default_reminder_frequency() -> String {
    "28h".to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            warning_after: default_warning_after(),
            removal_after: default_removal_after(),
            confirmation_threshold: 0.0,
            confirmation_timeout: default_confirmation_timeout(),
            reconcile_interval: default_reconcile_interval(),
            approve_token: default_approve_token(),
            deny_token: default_deny_token(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            frequency: default_reminder_frequency(),
            message: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Validated runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub guild_id: u64,
    pub reconcile: ReconcileSettings,
    pub reminder: ReminderSettings,
    pub admission: AdmissionSettings,
    pub audit_channel: Option<ChannelId>,
    pub store_path: PathBuf,
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|source| ConfigError::Duration { field, source })
}

fn non_zero(field: &str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Invalid(format!("{} must be greater than zero", field)));
    }
    Ok(value)
}

impl WardenConfig {
    /// Create a configuration with default policy for the given ids
    pub fn new(guild: u64, pending: u64, verified: u64, review: u64, reminder: u64) -> Self {
        Self {
            guild: GuildConfig { id: guild },
            roles: RolesConfig {
                pending,
                baseline: Vec::new(),
                verified,
                reviewers: None,
            },
            channels: ChannelsConfig {
                review,
                reminder,
                audit: None,
            },
            policy: PolicyConfig::default(),
            reminder: ReminderConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: WardenConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.settings()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_file(path, &contents)
    }

    /// Resolve durations and ids, checking the policy is coherent.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let policy_config = &self.policy;

        let warning_after = parse_duration("policy.warning_after", &policy_config.warning_after)?;
        let removal_after = parse_duration("policy.removal_after", &policy_config.removal_after)?;
        if removal_after <= warning_after {
            return Err(ConfigError::Invalid(
                "policy.removal_after must be longer than policy.warning_after".to_string(),
            ));
        }

        let threshold = policy_config.confirmation_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "policy.confirmation_threshold must be between 0 and 1, got {}",
                threshold
            )));
        }

        let timeout = non_zero(
            "policy.confirmation_timeout",
            parse_duration("policy.confirmation_timeout", &policy_config.confirmation_timeout)?,
        )?;
        let interval = non_zero(
            "policy.reconcile_interval",
            parse_duration("policy.reconcile_interval", &policy_config.reconcile_interval)?,
        )?;
        let frequency = non_zero(
            "reminder.frequency",
            parse_duration("reminder.frequency", &self.reminder.frequency)?,
        )?;

        if policy_config.approve_token == policy_config.deny_token {
            return Err(ConfigError::Invalid(
                "policy.approve_token and policy.deny_token must differ".to_string(),
            ));
        }
        if self.roles.pending == self.roles.verified {
            return Err(ConfigError::Invalid(
                "roles.pending and roles.verified must differ".to_string(),
            ));
        }

        let pending_role = RoleId(self.roles.pending);
        let mut baseline_roles: std::collections::BTreeSet<RoleId> =
            self.roles.baseline.iter().copied().map(RoleId).collect();
        baseline_roles.insert(RoleId(self.guild.id));

        let policy = Policy {
            warning_after,
            removal_after,
            pending_role,
            baseline_roles,
        };

        let message = self
            .reminder
            .message
            .clone()
            .unwrap_or_else(|| default_reminder_message(pending_role, policy.removal_after_days()));

        Ok(Settings {
            guild_id: self.guild.id,
            reconcile: ReconcileSettings {
                policy,
                gate: GateSettings {
                    threshold,
                    timeout,
                    review_channel: ChannelId(self.channels.review),
                    reviewer_role: self.roles.reviewers.map(RoleId),
                    approve_token: policy_config.approve_token.clone(),
                    deny_token: policy_config.deny_token.clone(),
                },
                interval,
            },
            reminder: ReminderSettings {
                channel: ChannelId(self.channels.reminder),
                frequency,
                message,
            },
            admission: AdmissionSettings::new(RoleId(self.roles.verified), pending_role),
            audit_channel: self.channels.audit.map(ChannelId),
            store_path: self.store.path.clone(),
        })
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(store_path: &Path) -> String {
        format!(
            r#"# Warden Configuration
#
# Replace the ids below with the ids of your community, roles and channels.

[guild]
# Community id (also the id of the role every member holds)
id = 1

[roles]
# Role given to members who have not verified after `warning_after`
pending = 2

# Roles that do not count as verification (the guild role is always included)
baseline = []

# Role granted when a member accepts the rules
verified = 3

# Role mentioned on confirmation prompts (optional)
# reviewers = 4

[channels]
# Where removal confirmation prompts are posted
review = 10

# Where the recurring reminder is posted
reminder = 11

# Where reports are mirrored (optional)
# audit = 12

[policy]
# Unverified members get the pending role after this long
warning_after = "3days"

# Unverified members are removed after this long
removal_after = "30days"

# Share of the population (0.0 - 1.0) below which removal needs no confirmation.
# 0.0 means every removal batch must be confirmed.
confirmation_threshold = 0.0

# How long reviewers have to answer a prompt
confirmation_timeout = "5m"

# Time between reconciliation passes
reconcile_interval = "30m"

approve_token = "{approve}"
deny_token = "{deny}"

[reminder]
# Time between reminders
frequency = "28h"

# Override the reminder text (optional)
# message = "..."

[store]
# SQLite database holding the last reminder id
path = "{store_path}"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/warden/warden.log"
"#,
            approve = DEFAULT_APPROVE_TOKEN,
            deny = DEFAULT_DENY_TOKEN,
            store_path = store_path.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path, store_path: &Path) -> Result<(), ConfigError> {
        write_file(config_path, &Self::generate_default_toml(store_path))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("config.toml")
}

/// Get the default store path
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("warden.db")
}
