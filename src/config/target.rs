//! Monitored target definition

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::duration_secs;
use crate::checker::CheckerSpec;

/// Check interval used when a target does not set one
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(180);

/// A reservation page to watch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Unique target ID, also the key of its persisted state
    pub id: String,
    /// Human-readable name used in notifications
    pub name: String,
    /// Reservation page URL
    pub url: String,
    /// Preferred check interval
    #[serde(with = "duration_secs", default = "default_check_interval")]
    pub check_interval: Duration,
    /// Whether the target is watched at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Checker variant and its parameters
    #[serde(flatten)]
    pub checker: CheckerSpec,
}

fn default_check_interval() -> Duration {
    DEFAULT_CHECK_INTERVAL
}

fn default_enabled() -> bool {
    true
}

impl Target {
    /// Create a form-select target with default settings
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            enabled: true,
            checker: CheckerSpec::FormSelect { selector: None },
        }
    }

    /// Set check interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set enabled state
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set checker variant
    pub fn with_checker(mut self, checker: CheckerSpec) -> Self {
        self.checker = checker;
        self
    }
}
