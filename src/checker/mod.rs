//! Availability checkers
//!
//! A checker turns a target into a [`CheckOutcome`]. Implementations must not
//! let their own errors escape: anything that goes wrong is reported as
//! `CheckOutcome::Failure`. The scheduler still guards against checkers that
//! hang or panic.

pub mod form_select;

pub use form_select::{FormSelectChecker, SelectScanner, DEFAULT_SELECTOR};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Target;
use crate::monitor::CheckOutcome;

/// User agent sent with page requests
pub const USER_AGENT: &str = concat!("slotwatch/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout of the shared HTTP client
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Checks one target for open slots
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn check(&self, target: &Target) -> CheckOutcome;
}

/// Checker variant configured per target (`scraper_type` in targets.json)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scraper_type", rename_all = "snake_case")]
pub enum CheckerSpec {
    /// Options of a `<select>` element on the reservation page
    FormSelect {
        #[serde(default)]
        selector: Option<String>,
    },
}

/// Build the checker for a target
pub fn build_checker(
    spec: &CheckerSpec,
    client: &reqwest::Client,
) -> Result<Arc<dyn AvailabilityChecker>, CheckerError> {
    match spec {
        CheckerSpec::FormSelect { selector } => {
            let selector = selector.as_deref().unwrap_or(DEFAULT_SELECTOR);
            Ok(Arc::new(FormSelectChecker::new(client.clone(), selector)?))
        }
    }
}

/// HTTP client shared by all page checkers
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, CheckerError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| CheckerError::Client(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Select element not found")]
    SelectNotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_form_select_checker() {
        let client = http_client(Duration::from_secs(5)).unwrap();
        let spec = CheckerSpec::FormSelect { selector: None };
        assert!(build_checker(&spec, &client).is_ok());

        let spec = CheckerSpec::FormSelect {
            selector: Some("div > select".to_string()),
        };
        assert!(matches!(
            build_checker(&spec, &client),
            Err(CheckerError::InvalidSelector { .. })
        ));
    }
}
