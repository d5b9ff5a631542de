//! Monitor configuration
//!
//! Loaded once at startup from two JSON documents in a config directory:
//! `config.json` (notification credentials and file locations) and
//! `targets.json` (the reservation pages to watch).

mod target;

pub use target::{Target, DEFAULT_CHECK_INTERVAL};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "config.json";
/// Targets file name inside the config directory
pub const TARGETS_FILE: &str = "targets.json";

/// Env var overriding `telegram_bot_token`
pub const ENV_BOT_TOKEN: &str = "SLOTWATCH_TELEGRAM_BOT_TOKEN";
/// Env var overriding `telegram_chat_id`
pub const ENV_CHAT_ID: &str = "SLOTWATCH_TELEGRAM_CHAT_ID";
/// Env var naming the config directory
pub const ENV_CONFIG_DIR: &str = "SLOTWATCH_CONFIG_DIR";
/// Config directory used when `SLOTWATCH_CONFIG_DIR` is unset
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Contents of `config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Telegram bot API token
    pub telegram_bot_token: String,
    /// Telegram chat receiving the notifications
    #[serde(deserialize_with = "string_or_number")]
    pub telegram_chat_id: String,
    /// Location of the persisted target states
    pub state_file: PathBuf,
    /// Log file, appended to alongside stderr
    pub log_file: PathBuf,
    /// Optional webhook receiving every event as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Extra headers sent with webhook requests
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,
    /// Upper bound for a single availability check
    #[serde(
        rename = "check_timeout_secs",
        with = "duration_secs",
        default = "default_check_timeout"
    )]
    pub check_timeout: Duration,
    /// Pause after a failed round
    #[serde(
        rename = "error_backoff_secs",
        with = "duration_secs",
        default = "default_error_backoff"
    )]
    pub error_backoff: Duration,
}

fn default_check_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_error_backoff() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Deserialize)]
struct TargetsDocument {
    #[serde(default)]
    targets: Vec<serde_json::Value>,
}

impl TargetsDocument {
    /// Parse the enabled entries; disabled ones are skipped unparsed
    fn into_targets(self, path: &Path) -> Result<Vec<Target>, ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let enabled: Vec<serde_json::Value> = self
            .targets
            .into_iter()
            .filter(|entry| entry.get("enabled").and_then(serde_json::Value::as_bool) != Some(false))
            .collect();
        if enabled.is_empty() {
            return Err(ConfigError::NoEnabledTargets);
        }

        enabled
            .into_iter()
            .map(|entry| {
                serde_json::from_value(entry).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })
            })
            .collect()
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub settings: MonitorSettings,
    /// Enabled targets only, in file order
    pub targets: Vec<Target>,
}

impl MonitorConfig {
    /// Load `config.json` and `targets.json` from `dir`, applying env overrides
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let settings_raw = read_file(&dir.join(SETTINGS_FILE))?;
        let targets_raw = read_file(&dir.join(TARGETS_FILE))?;

        let mut settings: MonitorSettings =
            serde_json::from_str(&settings_raw).map_err(|source| ConfigError::Parse {
                path: dir.join(SETTINGS_FILE).display().to_string(),
                source,
            })?;
        settings.apply_overrides(|key| std::env::var(key).ok());

        let targets_path = dir.join(TARGETS_FILE);
        let document: TargetsDocument =
            serde_json::from_str(&targets_raw).map_err(|source| ConfigError::Parse {
                path: targets_path.display().to_string(),
                source,
            })?;

        settings.validate()?;
        Self::from_parts(settings, document.into_targets(&targets_path)?)
    }

    /// Validate settings and targets, dropping disabled targets
    pub fn from_parts(settings: MonitorSettings, targets: Vec<Target>) -> Result<Self, ConfigError> {
        settings.validate()?;

        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let targets: Vec<Target> = targets.into_iter().filter(|t| t.enabled).collect();
        if targets.is_empty() {
            return Err(ConfigError::NoEnabledTargets);
        }

        let mut seen = HashSet::new();
        for target in &targets {
            let missing: Vec<&str> = [
                ("id", target.id.trim().is_empty()),
                ("name", target.name.trim().is_empty()),
                ("url", target.url.trim().is_empty()),
            ]
            .into_iter()
            .filter_map(|(field, empty)| empty.then_some(field))
            .collect();
            if !missing.is_empty() {
                return Err(ConfigError::InvalidTarget {
                    id: target.id.clone(),
                    reason: format!("missing fields: {}", missing.join(", ")),
                });
            }
            if target.check_interval.is_zero() {
                return Err(ConfigError::InvalidTarget {
                    id: target.id.clone(),
                    reason: "check_interval must be positive".to_string(),
                });
            }
            if !seen.insert(target.id.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.id.clone()));
            }
        }

        Ok(Self { settings, targets })
    }

    /// Shortest check interval across all targets; the scheduler's round cadence
    pub fn min_interval(&self) -> Duration {
        self.targets
            .iter()
            .map(|t| t.check_interval)
            .min()
            .unwrap_or(DEFAULT_CHECK_INTERVAL)
    }

    /// Look up a target by id
    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }
}

impl MonitorSettings {
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_BOT_TOKEN).filter(|v| !v.is_empty()) {
            self.telegram_bot_token = token;
        }
        if let Some(chat_id) = lookup(ENV_CHAT_ID).filter(|v| !v.is_empty()) {
            self.telegram_chat_id = chat_id;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [
            ("telegram_bot_token", self.telegram_bot_token.trim().is_empty()),
            ("telegram_chat_id", self.telegram_chat_id.trim().is_empty()),
            ("state_file", self.state_file.as_os_str().is_empty()),
            ("log_file", self.log_file.as_os_str().is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing.join(", ")));
        }
        if self.check_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "check_timeout_secs must be positive".to_string(),
            ));
        }
        if self.error_backoff.is_zero() {
            return Err(ConfigError::Invalid(
                "error_backoff_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

// Telegram chat ids are often written as bare numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(s) => s,
        Raw::Int(i) => i.to_string(),
    })
}

/// Configuration errors; all of them are fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required config fields: {0}")]
    MissingFields(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("No targets configured")]
    NoTargets,

    #[error("No enabled targets found")]
    NoEnabledTargets,

    #[error("Target '{id}' is invalid: {reason}")]
    InvalidTarget { id: String, reason: String },

    #[error("Duplicate target id: {0}")]
    DuplicateTarget(String),
}

/// Durations written as whole seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
