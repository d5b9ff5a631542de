//! Availability monitoring
//!
//! Per-target state, the transition that turns a check outcome into the next
//! state plus notification events, and the scheduler that drives it all.

pub mod clock;
pub mod events;
pub mod scheduler;
pub mod state;
pub mod transition;

pub use clock::{Clock, SystemClock};
pub use events::{EventKind, NotificationEvent};
pub use scheduler::{MonitorError, MonitoredTarget, PollScheduler, RoundReport, SchedulerConfig};
pub use state::{Availability, CheckOutcome, Health, Slot, TargetState};
pub use transition::{transition, Transition};
