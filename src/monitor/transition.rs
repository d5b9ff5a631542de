//! Transition engine
//!
//! Turns the prior state of a target plus a fresh check outcome into the next
//! state and the notifications that change warrants. No I/O happens here: the
//! caller supplies the current time and persists/dispatches the result.

use chrono::{DateTime, Utc};

use super::events::NotificationEvent;
use super::state::{CheckOutcome, Slot, TargetState};
use crate::config::Target;

/// Output of [`transition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: TargetState,
    /// At most one event per kind; `Recovered` always comes first
    pub events: Vec<NotificationEvent>,
}

/// Compute the next state of `target` after `outcome`
pub fn transition(
    target: &Target,
    prior: &TargetState,
    outcome: CheckOutcome,
    now: DateTime<Utc>,
) -> Transition {
    match outcome {
        CheckOutcome::Success {
            dates_available,
            slots,
        } => on_success(target, prior, dates_available, slots, now),
        CheckOutcome::Failure(message) => on_failure(target, prior, message),
    }
}

fn on_success(
    target: &Target,
    prior: &TargetState,
    dates_available: bool,
    slots: Vec<Slot>,
    now: DateTime<Utc>,
) -> Transition {
    let mut events = Vec::new();

    if prior.error_notified {
        events.push(NotificationEvent::Recovered {
            target: target.name.clone(),
        });
    }

    // Slots are only kept while dates are available
    let slots = if dates_available { slots } else { Vec::new() };

    if dates_available && !prior.dates_available {
        events.push(NotificationEvent::DatesAvailable {
            target: target.name.clone(),
            url: target.url.clone(),
            slots: slots.clone(),
        });
    } else if !dates_available && prior.dates_available {
        events.push(NotificationEvent::DatesUnavailable {
            target: target.name.clone(),
        });
    }

    Transition {
        next: TargetState {
            last_check: Some(now),
            dates_available,
            available_slots: slots,
            consecutive_errors: 0,
            error_notified: false,
        },
        events,
    }
}

fn on_failure(target: &Target, prior: &TargetState, message: String) -> Transition {
    // last_check is only advanced by successful checks
    let mut next = TargetState {
        consecutive_errors: prior.consecutive_errors.saturating_add(1),
        ..prior.clone()
    };

    let mut events = Vec::new();
    if !prior.error_notified {
        events.push(NotificationEvent::ErrorEntered {
            target: target.name.clone(),
            message,
            error_count: next.consecutive_errors,
        });
        next.error_notified = true;
    }

    Transition { next, events }
}
