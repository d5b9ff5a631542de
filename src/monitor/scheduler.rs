//! Poll scheduler
//!
//! Every round checks all targets concurrently, waits for every outcome, then
//! runs transition, persistence and notification for each target. Rounds are
//! separated by the shortest configured check interval.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::clock::{Clock, SystemClock};
use super::events::NotificationEvent;
use super::state::CheckOutcome;
use super::transition::{transition, Transition};
use crate::checker::AvailabilityChecker;
use crate::config::Target;
use crate::notify::NotificationSink;
use crate::store::{StateStore, StoreError};

/// Scheduler timing
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between rounds
    pub interval: Duration,
    /// Upper bound for one checker call
    pub check_timeout: Duration,
    /// Pause after a failed round
    pub error_backoff: Duration,
}

impl SchedulerConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            check_timeout: Duration::from_secs(60),
            error_backoff: Duration::from_secs(60),
        }
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }
}

/// A target together with the checker that serves it
#[derive(Clone)]
pub struct MonitoredTarget {
    pub target: Arc<Target>,
    pub checker: Arc<dyn AvailabilityChecker>,
}

impl MonitoredTarget {
    pub fn new(target: Target, checker: Arc<dyn AvailabilityChecker>) -> Self {
        Self {
            target: Arc::new(target),
            checker,
        }
    }
}

/// Summary of one completed round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub checked: usize,
    pub failed: usize,
    pub events: usize,
}

pub struct PollScheduler {
    targets: Vec<MonitoredTarget>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl PollScheduler {
    pub fn new(
        targets: Vec<MonitoredTarget>,
        store: Arc<dyn StateStore>,
        sink: Arc<dyn NotificationSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            targets,
            store,
            sink,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run rounds until `shutdown` fires or its sender is dropped
    ///
    /// Shutdown abandons checks still in flight; a round whose outcomes are
    /// already being applied is finished first.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) {
        tracing::info!("Monitoring {} target(s)", self.targets.len());
        self.announce_startup().await;

        loop {
            let outcomes = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, abandoning in-flight checks");
                    break;
                }
                outcomes = self.collect_outcomes() => outcomes,
            };

            let applied = AssertUnwindSafe(self.apply_outcomes(outcomes))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(MonitorError::Round(panic_message(&*panic))));

            let wait = match applied {
                Ok(report) => {
                    tracing::info!(
                        checked = report.checked,
                        failed = report.failed,
                        events = report.events,
                        "Round complete"
                    );
                    tracing::info!(
                        "Waiting {} seconds until next check...",
                        self.config.interval.as_secs()
                    );
                    self.config.interval
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        backoff_secs = self.config.error_backoff.as_secs(),
                        "Error in monitoring loop"
                    );
                    self.config.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Monitor shutting down");
                    break;
                }
                _ = self.clock.sleep(wait) => {}
            }
        }

        tracing::info!("Monitor stopped");
    }

    /// Send the one-off startup notification
    pub async fn announce_startup(&self) {
        let event = NotificationEvent::Startup {
            target_names: self.targets.iter().map(|t| t.target.name.clone()).collect(),
            interval: self.config.interval,
        };
        self.sink.deliver(&event).await;
    }

    /// One full round: check everything, then apply every outcome
    pub async fn run_round(&self) -> Result<RoundReport, MonitorError> {
        let outcomes = self.collect_outcomes().await;
        self.apply_outcomes(outcomes).await
    }

    /// Check all targets concurrently; the result is index-aligned with the targets
    ///
    /// Never fails: timeouts and panics become `CheckOutcome::Failure`. Dropping
    /// the future aborts the checks still running.
    pub async fn collect_outcomes(&self) -> Vec<CheckOutcome> {
        let mut tasks = JoinSet::new();

        for (index, monitored) in self.targets.iter().enumerate() {
            let target = Arc::clone(&monitored.target);
            let checker = Arc::clone(&monitored.checker);
            let timeout = self.config.check_timeout;
            let span = tracing::info_span!("check", target_id = %target.id);

            tasks.spawn(
                async move {
                    let outcome = guarded_check(checker.as_ref(), &target, timeout).await;
                    (index, outcome)
                }
                .instrument(span),
            );
        }

        let mut outcomes: Vec<Option<CheckOutcome>> = vec![None; self.targets.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "Check task did not complete"),
            }
        }

        outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| CheckOutcome::failure("Check task did not complete")))
            .collect()
    }

    /// Transition, persist and notify for every target, independently
    pub async fn apply_outcomes(
        &self,
        outcomes: Vec<CheckOutcome>,
    ) -> Result<RoundReport, MonitorError> {
        let now = self.clock.now();
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();

        let results = futures::future::join_all(
            self.targets
                .iter()
                .zip(outcomes)
                .map(|(monitored, outcome)| self.apply_one(&monitored.target, outcome, now)),
        )
        .await;

        let mut report = RoundReport {
            checked: results.len(),
            failed,
            events: 0,
        };
        let mut unsaved = Vec::new();
        let mut first_error = None;

        for (monitored, result) in self.targets.iter().zip(results) {
            match result {
                Ok(events) => report.events += events,
                Err(e) => {
                    unsaved.push(monitored.target.id.clone());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(report),
            Some(source) => Err(MonitorError::Persistence {
                targets: unsaved,
                source,
            }),
        }
    }

    async fn apply_one(
        &self,
        target: &Target,
        outcome: CheckOutcome,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        log_outcome(target, &outcome);

        let prior = self.store.get(&target.id)?;
        let Transition { next, events } = transition(target, &prior, outcome, now);

        if let Err(e) = self.store.put(&target.id, &next) {
            tracing::error!(target_id = %target.id, error = %e, "Failed to persist state");
            return Err(e);
        }

        tracing::debug!(
            target_id = %target.id,
            availability = %next.availability(),
            health = %next.health(),
            consecutive_errors = next.consecutive_errors,
            "State updated"
        );

        for event in &events {
            self.sink.deliver(event).await;
        }

        Ok(events.len())
    }
}

async fn guarded_check(
    checker: &dyn AvailabilityChecker,
    target: &Target,
    timeout: Duration,
) -> CheckOutcome {
    let check = AssertUnwindSafe(checker.check(target)).catch_unwind();

    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(panic)) => {
            let message = panic_message(&*panic);
            tracing::error!(target_id = %target.id, error = %message, "Checker panicked");
            CheckOutcome::failure(message)
        }
        Err(_) => CheckOutcome::failure(format!(
            "Check timed out after {} seconds",
            timeout.as_secs()
        )),
    }
}

fn log_outcome(target: &Target, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Success {
            dates_available: true,
            slots,
        } => tracing::info!(
            target_id = %target.id,
            "{}: Dates available ({} options)",
            target.name,
            slots.len()
        ),
        CheckOutcome::Success { .. } => {
            tracing::info!(target_id = %target.id, "{}: No dates available yet", target.name)
        }
        CheckOutcome::Failure(message) => tracing::error!(
            target_id = %target.id,
            "{}: Check failed - {}",
            target.name,
            message
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Unexpected error: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Unexpected error: {}", s)
    } else {
        "Unexpected error".to_string()
    }
}

/// Round-level failures; the loop logs them and backs off
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to persist state for {}: {source}", .targets.join(", "))]
    Persistence {
        targets: Vec<String>,
        #[source]
        source: StoreError,
    },

    #[error("Round aborted: {0}")]
    Round(String),
}
