//! Daemon orchestration -- configuration, runtime connection, and supervision.
//!
//! The [`Orchestrator`] is the central coordinator of `autoheal-daemon`.
//! It resolves the layered configuration, installs the metrics recorder,
//! connects to the container runtime, runs the watchdog, and decides how the
//! process ends.
//!
//! # Startup Order
//!
//! 1. Resolve config (defaults -> TOML file -> environment -> CLI flags) and validate
//! 2. Install metrics recorder (when enabled)
//! 3. Connect to the runtime socket, negotiate the API version, ping
//! 4. Spawn the watchdog (poller + tracker)
//!
//! Any failure in steps 1-3 ends the process before the first poll.
//!
//! # Shutdown
//!
//! - `SIGTERM` / `SIGINT`: cancel the shared token, let the poller stop and the
//!   tracker drain, exit 0
//! - Watchdog ends on its own: fatal, exit non-zero

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use autoheal_core::config::{AutohealConfig, RejectedEnvVar};
use autoheal_core::error::AutohealError;
use autoheal_watchdog::{
    BollardRuntimeClient, RuntimeClient, Watchdog, WatchdogBuilder, WatchdogReport,
    WatchdogSettings,
};

use crate::cli::DaemonCli;
use crate::metrics_server;

/// Configuration resolved for this process.
#[derive(Debug)]
pub struct LoadedConfig {
    /// Validated configuration.
    pub config: AutohealConfig,
    /// `AUTOHEAL_*` variables whose values could not be parsed and were ignored.
    pub rejected_env: Vec<RejectedEnvVar>,
}

/// Resolve the effective configuration for this process.
///
/// Layers, lowest priority first: built-in defaults (or the `--config` file),
/// `AUTOHEAL_*` environment variables, CLI flags. The result is validated.
///
/// Runs before logging is initialised, so unparsable environment values are
/// returned in [`LoadedConfig::rejected_env`] instead of being logged here.
///
/// # Errors
///
/// - Config file missing or unparsable
/// - Validation fails after all overrides are applied
pub async fn load_config(cli: &DaemonCli) -> Result<LoadedConfig> {
    let mut config = match &cli.config {
        Some(path) => AutohealConfig::from_file(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AutohealConfig::default(),
    };

    let rejected_env = config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    config.validate().context("config validation failed")?;

    Ok(LoadedConfig {
        config,
        rejected_env,
    })
}

/// Log every ignored environment value at `warn`.
pub fn report_rejected_env(rejected: &[RejectedEnvVar]) {
    for entry in rejected {
        tracing::warn!(
            env_key = entry.key,
            value = entry.value.as_str(),
            expected = entry.expected,
            "failed to parse env var, ignoring"
        );
    }
}

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: AutohealConfig,
    /// Shared cancellation token for every background task.
    cancel: CancellationToken,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Build from an already-resolved configuration.
    ///
    /// Validates the configuration again and installs the metrics recorder when
    /// `[metrics] enabled = true`.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the metrics endpoint cannot be
    /// installed.
    pub fn build_from_config(config: AutohealConfig) -> Result<Self> {
        config.validate().context("config validation failed")?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            metrics_server::record_build_info();
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        Ok(Self {
            config,
            cancel: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &AutohealConfig {
        &self.config
    }

    /// Token cancelled on shutdown or fatal watchdog failure.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Typed watchdog settings derived from the configuration.
    pub fn watchdog_settings(&self) -> WatchdogSettings {
        WatchdogSettings::from_core(&self.config.watchdog)
    }

    /// Connect to the runtime and run the watchdog until a shutdown signal.
    ///
    /// # Errors
    ///
    /// - Runtime client cannot be constructed, version negotiation fails, or
    ///   the runtime does not answer a ping
    /// - Signal handlers cannot be installed
    /// - The watchdog stops without a shutdown signal
    pub async fn run(&self) -> Result<WatchdogReport> {
        let settings = self.watchdog_settings();

        tracing::info!(socket = %settings.socket, "connecting to container runtime");
        let client = BollardRuntimeClient::connect(&settings.socket, settings.timeout)
            .map_err(AutohealError::from)
            .context("failed to create runtime client")?
            .negotiate_version(settings.timeout)
            .await
            .map_err(AutohealError::from)
            .context("failed to negotiate runtime api version")?;

        let watchdog = WatchdogBuilder::new()
            .settings(settings)
            .runtime_client(Arc::new(client))
            .build()
            .map_err(AutohealError::from)
            .context("failed to build watchdog")?;

        watchdog
            .verify_runtime()
            .await
            .map_err(AutohealError::from)
            .context("container runtime not reachable")?;
        tracing::info!("container runtime reachable");

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| metrics_server::spawn_uptime_updater(self.start_time, self.cancel.clone()));

        let result = supervise(watchdog, self.cancel.clone(), wait_for_shutdown_signal()).await;

        // supervise() always leaves the token cancelled
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        result
    }
}

/// Run `watchdog` until `shutdown` resolves or the watchdog stops by itself.
///
/// A watchdog that ends before `shutdown` resolves is a fatal error. On return
/// `cancel` is always cancelled.
///
/// # Errors
///
/// - `shutdown` fails (e.g. signal handler installation)
/// - The watchdog ends on its own, with or without an error
pub async fn supervise<D, S>(
    watchdog: Watchdog<D>,
    cancel: CancellationToken,
    shutdown: S,
) -> Result<WatchdogReport>
where
    D: RuntimeClient,
    S: Future<Output = Result<&'static str>>,
{
    let mut task = tokio::spawn(watchdog.run(cancel.clone()));

    tokio::select! {
        signal = shutdown => {
            cancel.cancel();
            let signal = match signal {
                Ok(signal) => signal,
                Err(e) => {
                    match task.await {
                        Ok(Ok(_)) => {}
                        Ok(Err(watchdog_err)) => {
                            tracing::error!(error = %watchdog_err, "watchdog failed during shutdown");
                        }
                        Err(join_err) => {
                            tracing::error!(error = %join_err, "watchdog task failed during shutdown");
                        }
                    }
                    return Err(e);
                }
            };
            tracing::info!(signal = signal, "shutdown signal received");

            let report = task
                .await
                .context("watchdog task failed")?
                .map_err(AutohealError::from)
                .context("watchdog failed during shutdown")?;
            tracing::info!(
                restarts = report.restarts_attempted,
                restart_failures = report.restart_failures,
                "autoheal-daemon shut down"
            );
            Ok(report)
        }
        result = &mut task => {
            cancel.cancel();
            let err = match result {
                Ok(Ok(_)) => anyhow::anyhow!("watchdog stopped without a shutdown signal"),
                Ok(Err(e)) => anyhow::Error::new(AutohealError::from(e)).context("watchdog failed"),
                Err(e) => anyhow::Error::new(e).context("watchdog task failed"),
            };
            let detail = format!("{err:#}");
            tracing::error!(error = %detail, "watchdog is no longer running, exiting");
            Err(err)
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
