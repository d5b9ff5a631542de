//! Notification events decided by the monitor

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::state::Slot;
use crate::config::duration_secs;

/// Something the operator should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Monitoring started
    Startup {
        target_names: Vec<String>,
        #[serde(rename = "interval_secs", with = "duration_secs")]
        interval: Duration,
    },
    /// A target went from no slots to some slots
    DatesAvailable {
        target: String,
        url: String,
        slots: Vec<Slot>,
    },
    /// A target's slots are gone
    DatesUnavailable { target: String },
    /// First failure of an error run
    ErrorEntered {
        target: String,
        message: String,
        error_count: u32,
    },
    /// A reported error run ended with a successful check
    Recovered { target: String },
}

/// Discriminant of [`NotificationEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Startup,
    DatesAvailable,
    DatesUnavailable,
    ErrorEntered,
    Recovered,
}

impl NotificationEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NotificationEvent::Startup { .. } => EventKind::Startup,
            NotificationEvent::DatesAvailable { .. } => EventKind::DatesAvailable,
            NotificationEvent::DatesUnavailable { .. } => EventKind::DatesUnavailable,
            NotificationEvent::ErrorEntered { .. } => EventKind::ErrorEntered,
            NotificationEvent::Recovered { .. } => EventKind::Recovered,
        }
    }

    /// Name of the target the event concerns, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            NotificationEvent::Startup { .. } => None,
            NotificationEvent::DatesAvailable { target, .. }
            | NotificationEvent::DatesUnavailable { target }
            | NotificationEvent::ErrorEntered { target, .. }
            | NotificationEvent::Recovered { target } => Some(target),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Startup => write!(f, "startup"),
            EventKind::DatesAvailable => write!(f, "dates_available"),
            EventKind::DatesUnavailable => write!(f, "dates_unavailable"),
            EventKind::ErrorEntered => write!(f, "error_entered"),
            EventKind::Recovered => write!(f, "recovered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = NotificationEvent::Startup {
            target_names: vec!["Main Hall".to_string()],
            interval: Duration::from_secs(180),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "startup");
        assert_eq!(json["interval_secs"], 180);

        let event = NotificationEvent::ErrorEntered {
            target: "Main Hall".to_string(),
            message: "timeout".to_string(),
            error_count: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], EventKind::ErrorEntered.to_string());
        assert_eq!(json["error_count"], 1);
    }

    #[test]
    fn test_event_target() {
        let event = NotificationEvent::Recovered {
            target: "Main Hall".to_string(),
        };
        assert_eq!(event.target(), Some("Main Hall"));
        assert_eq!(event.kind(), EventKind::Recovered);
    }
}
