//! Per-target monitoring state and check outcomes

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One bookable option as offered by the reservation page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Form value submitted when booking
    pub value: String,
    /// Text shown to the user
    #[serde(alias = "text")]
    pub label: String,
}

impl Slot {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Persisted state of a single target
///
/// Only the transition engine produces new values of this type; the store
/// replaces records wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    /// Time of the last successful check
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_check: Option<DateTime<Utc>>,
    /// Availability as of the last successful check
    #[serde(default)]
    pub dates_available: bool,
    /// Options seen on the last successful check; empty when unavailable
    #[serde(default, alias = "available_dates")]
    pub available_slots: Vec<Slot>,
    /// Failed checks since the last success
    #[serde(default)]
    pub consecutive_errors: u32,
    /// Whether the current error run was already reported
    #[serde(default)]
    pub error_notified: bool,
}

impl TargetState {
    pub fn availability(&self) -> Availability {
        if self.dates_available {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    pub fn health(&self) -> Health {
        if self.consecutive_errors > 0 {
            Health::Erroring
        } else {
            Health::Healthy
        }
    }

    /// Check the record invariants
    pub fn is_consistent(&self) -> bool {
        (!self.error_notified || self.consecutive_errors > 0)
            && (self.available_slots.is_empty() || self.dates_available)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Erroring,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Unavailable => write!(f, "unavailable"),
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Healthy => write!(f, "healthy"),
            Health::Erroring => write!(f, "erroring"),
        }
    }
}

/// Result of a single availability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Success {
        dates_available: bool,
        slots: Vec<Slot>,
    },
    Failure(String),
}

impl CheckOutcome {
    /// Successful check; availability follows from the slot list
    pub fn success(slots: Vec<Slot>) -> Self {
        CheckOutcome::Success {
            dates_available: !slots.is_empty(),
            slots,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        CheckOutcome::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::Success { .. })
    }
}

// Accepts RFC 3339 as well as the naive ISO timestamps older state files carry.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = TargetState::default();
        assert!(state.last_check.is_none());
        assert_eq!(state.availability(), Availability::Unavailable);
        assert_eq!(state.health(), Health::Healthy);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_inconsistent_states() {
        let notified_without_errors = TargetState {
            error_notified: true,
            ..Default::default()
        };
        assert!(!notified_without_errors.is_consistent());

        let slots_while_unavailable = TargetState {
            available_slots: vec![Slot::new("1", "one")],
            ..Default::default()
        };
        assert!(!slots_while_unavailable.is_consistent());
    }

    #[test]
    fn test_legacy_record_loads() {
        let json = r#"{
            "last_check": "2024-09-01T18:30:12.345678",
            "dates_available": true,
            "available_dates": [{"value": "12", "text": "Dec 12"}],
            "consecutive_errors": 0
        }"#;
        let state: TargetState = serde_json::from_str(json).unwrap();
        assert_eq!(state.available_slots, vec![Slot::new("12", "Dec 12")]);
        assert!(!state.error_notified);
        assert_eq!(
            state.last_check.unwrap().to_rfc3339(),
            "2024-09-01T18:30:12.345678+00:00"
        );
    }

    #[test]
    fn test_state_field_names() {
        let state = TargetState {
            dates_available: true,
            available_slots: vec![Slot::new("12", "Dec 12")],
            ..Default::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["available_slots"][0]["label"], "Dec 12");
        assert_eq!(json["consecutive_errors"], 0);
        assert!(json["last_check"].is_null());
    }

    #[test]
    fn test_outcome_success_derives_availability() {
        assert_eq!(
            CheckOutcome::success(vec![]),
            CheckOutcome::Success {
                dates_available: false,
                slots: vec![]
            }
        );
        assert!(matches!(
            CheckOutcome::success(vec![Slot::new("1", "one")]),
            CheckOutcome::Success {
                dates_available: true,
                ..
            }
        ));
    }
}
