//! CLI argument definitions for autoheal-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Every flag is optional; flags that are given override the config file and
//! environment variables.

use std::path::PathBuf;

use autoheal_core::config::AutohealConfig;
use clap::Parser;

/// Unhealthy container watchdog.
///
/// Polls the container runtime for unhealthy containers and restarts a
/// container after it has been reported unhealthy on consecutive polls.
#[derive(Parser, Debug, Default)]
#[command(name = "autoheal-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to an autoheal.toml configuration file.
    ///
    /// Without it the built-in defaults are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds between poll cycles.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Deadline in seconds for each runtime call (list and restart).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Consecutive unhealthy observations before a restart.
    #[arg(long, value_name = "N")]
    pub unhealthy_count: Option<u32>,

    /// Container runtime socket path.
    #[arg(long, value_name = "PATH")]
    pub socket: Option<String>,

    /// Only watch containers carrying this label ("all" disables filtering).
    #[arg(long, value_name = "LABEL")]
    pub filter: Option<String>,

    /// Stop with an error after this many failed polls in a row (0 = never).
    #[arg(long, value_name = "N")]
    pub max_consecutive_failures: Option<u32>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply the flags that were given on top of `config`.
    pub fn apply_overrides(&self, config: &mut AutohealConfig) {
        if let Some(interval) = self.interval {
            config.watchdog.interval_secs = interval;
        }
        if let Some(timeout) = self.timeout {
            config.watchdog.timeout_secs = timeout;
        }
        if let Some(count) = self.unhealthy_count {
            config.watchdog.unhealthy_count = count;
        }
        if let Some(socket) = &self.socket {
            config.watchdog.socket = socket.clone();
        }
        if let Some(filter) = &self.filter {
            config.watchdog.filter = filter.clone();
        }
        if let Some(max) = self.max_consecutive_failures {
            config.watchdog.max_consecutive_failures = max;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
