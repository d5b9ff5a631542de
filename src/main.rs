//! Slotwatch monitor
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - SLOTWATCH_CONFIG_DIR: Directory holding config.json and targets.json (default: config)
//! - SLOTWATCH_TELEGRAM_BOT_TOKEN: Overrides telegram_bot_token from config.json
//! - SLOTWATCH_TELEGRAM_CHAT_ID: Overrides telegram_chat_id from config.json
//! - RUST_LOG: Log level (default: slotwatch=info)

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use slotwatch::checker::{build_checker, http_client, REQUEST_TIMEOUT};
use slotwatch::config::{MonitorConfig, DEFAULT_CONFIG_DIR, ENV_CONFIG_DIR};
use slotwatch::monitor::{MonitoredTarget, PollScheduler, SchedulerConfig};
use slotwatch::notify::{LogSink, MultiSink, TelegramSink, WebhookSink};
use slotwatch::store::JsonFileStore;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir =
        std::env::var(ENV_CONFIG_DIR).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());

    let config = match MonitorConfig::load(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            init_logging(None)?;
            tracing::error!(config_dir = %config_dir, error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    init_logging(Some(&config.settings.log_file))?;

    let settings = &config.settings;
    let interval = config.min_interval();

    tracing::info!("Slotwatch configuration:");
    tracing::info!("  Config directory: {}", config_dir);
    tracing::info!("  State file: {}", settings.state_file.display());
    tracing::info!("  Check interval: {} seconds", interval.as_secs());
    tracing::info!("  Check timeout: {} seconds", settings.check_timeout.as_secs());
    tracing::info!("  Targets: {}", config.targets.len());
    for target in &config.targets {
        tracing::info!("    - {} ({}) @ {}", target.name, target.id, target.url);
    }

    let store = Arc::new(JsonFileStore::open(&settings.state_file)?);
    let client = http_client(REQUEST_TIMEOUT)?;

    let mut targets = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        let checker = build_checker(&target.checker, &client)?;
        targets.push(MonitoredTarget::new(target.clone(), checker));
    }

    let mut sink = MultiSink::new()
        .with_sink(Arc::new(LogSink))
        .with_sink(Arc::new(TelegramSink::new(
            client.clone(),
            settings.telegram_bot_token.clone(),
            settings.telegram_chat_id.clone(),
        )));
    if let Some(url) = &settings.webhook_url {
        tracing::info!("  Webhook: {}", url);
        let webhook = settings
            .webhook_headers
            .iter()
            .fold(WebhookSink::new(client.clone(), url.clone()), |sink, (k, v)| {
                sink.with_header(k.clone(), v.clone())
            });
        sink = sink.with_sink(Arc::new(webhook));
    }

    let scheduler = PollScheduler::new(
        targets,
        store,
        Arc::new(sink),
        SchedulerConfig::new(interval)
            .with_check_timeout(settings.check_timeout)
            .with_error_backoff(settings.error_backoff),
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Monitor stopped by user");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                // dropping the sender would stop the monitor
                std::future::pending::<()>().await;
            }
        }
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}

/// Log to stderr and, once the configuration is known, to the log file
fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}
