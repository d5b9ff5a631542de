//! Slotwatch: reservation page monitor
//!
//! Periodically checks a set of reservation pages for bookable dates and
//! notifies when dates appear, disappear, or a page can no longer be checked.
//!
//! # Features
//!
//! - **Edge-triggered notifications**: one message per availability change
//! - **Error deduplication**: one alert per error run, one on recovery
//! - **Durable state**: per-target state survives restarts
//! - **Isolated checks**: a hanging or panicking checker only fails its own target
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use slotwatch::checker::{build_checker, http_client};
//! use slotwatch::config::MonitorConfig;
//! use slotwatch::monitor::{MonitoredTarget, PollScheduler, SchedulerConfig};
//! use slotwatch::notify::LogSink;
//! use slotwatch::store::JsonFileStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::load("config")?;
//! let client = http_client(Duration::from_secs(30))?;
//! let store = Arc::new(JsonFileStore::open(&config.settings.state_file)?);
//!
//! let mut targets = Vec::new();
//! for target in &config.targets {
//!     let checker = build_checker(&target.checker, &client)?;
//!     targets.push(MonitoredTarget::new(target.clone(), checker));
//! }
//!
//! let scheduler = PollScheduler::new(
//!     targets,
//!     store,
//!     Arc::new(LogSink),
//!     SchedulerConfig::new(config.min_interval()),
//! );
//! let report = scheduler.run_round().await?;
//! println!("{} target(s) checked", report.checked);
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod config;
pub mod monitor;
pub mod notify;
pub mod store;

pub use config::{MonitorConfig, Target};
pub use monitor::{CheckOutcome, NotificationEvent, PollScheduler, TargetState};
pub use store::{JsonFileStore, StateStore};
