//! Prometheus metrics endpoint and daemon-level gauges.
//!
//! The endpoint is served by the built-in HTTP listener of
//! `metrics-exporter-prometheus`. Until [`install_metrics_recorder`] runs, every
//! `metrics::counter!()` / `metrics::gauge!()` call in the workspace is a no-op.
//!
//! # Usage
//!
//! ```ignore
//! let config = MetricsConfig { enabled: true, ..Default::default() };
//! install_metrics_recorder(&config)?;
//! record_build_info();
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use anyhow::Result;
use autoheal_core::config::MetricsConfig;
use autoheal_core::metrics as m;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;

/// Uptime gauge refresh period.
const UPTIME_REFRESH: Duration = Duration::from_secs(10);

/// Resolve the socket address the scrape endpoint binds to.
///
/// # Errors
///
/// - `listen_addr` is not an IP address
/// - `endpoint` is anything other than `/metrics`
pub fn listen_socket_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let ip: IpAddr = config.listen_addr.parse().map_err(|e| {
        anyhow::anyhow!(
            "invalid metrics listen address '{}': {}",
            config.listen_addr,
            e
        )
    })?;
    Ok(SocketAddr::new(ip, config.port))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process.
///
/// # Errors
///
/// - Invalid listen address or endpoint
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_socket_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

/// Record the build info gauge (always 1, labelled with the crate version).
pub fn record_build_info() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "build info recorded");
}

/// Spawn a task that refreshes the uptime gauge until `cancel` fires.
pub fn spawn_uptime_updater(
    start_time: Instant,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_REFRESH);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(listen_addr: &str, port: u16, endpoint: &str) -> MetricsConfig {
        MetricsConfig {
            enabled: true,
            listen_addr: listen_addr.to_owned(),
            port,
            endpoint: endpoint.to_owned(),
        }
    }

    #[test]
    fn test_listen_socket_addr_for_defaults() {
        let addr = listen_socket_addr(&config("127.0.0.1", 9464, "/metrics")).unwrap();
        assert_eq!(addr, "127.0.0.1:9464".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_listen_socket_addr_accepts_ipv6() {
        let addr = listen_socket_addr(&config("::1", 9464, "/metrics")).unwrap();
        assert_eq!(addr, "[::1]:9464".parse::<SocketAddr>().unwrap());
        assert!(addr.is_ipv6());

        let any = listen_socket_addr(&config("::", 9464, "/metrics")).unwrap();
        assert!(any.ip().is_unspecified());
    }

    #[test]
    fn test_listen_socket_addr_rejects_hostname() {
        assert!(listen_socket_addr(&config("localhost", 9464, "/metrics")).is_err());
    }

    #[test]
    fn test_listen_socket_addr_rejects_custom_endpoint() {
        let err = listen_socket_addr(&config("127.0.0.1", 9464, "/stats")).unwrap_err();
        assert!(err.to_string().contains("/stats"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uptime_updater_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = spawn_uptime_updater(Instant::now(), cancel.clone());

        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();

        handle.await.expect("updater task should exit cleanly");
    }
}
