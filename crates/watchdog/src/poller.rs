//! Periodic unhealthy-container polling.
//!
//! The [`Poller`] asks the runtime which containers are unhealthy once per
//! interval and forwards each one as a [`HealthEvent`]. It runs on its own
//! timer and never overlaps polls: a slow runtime call delays the next poll
//! instead of stacking another one on top.
//!
//! # Backpressure
//!
//! Events are sent one at a time on a bounded channel (capacity 1). Each send
//! waits for the tracker to take the previous event, so a burst of unhealthy
//! containers never buffers in memory.
//!
//! # Failure handling
//!
//! A failed poll (timeout, connection error, runtime error) is logged and the
//! cycle is skipped. It produces no events and does not touch any streak. With
//! `max_consecutive_failures > 0` the poller gives up and returns
//! [`WatchdogError::PollerExhausted`] after that many failures in a row.

use std::sync::Arc;
use std::time::Duration;

use autoheal_core::metrics as m;
use autoheal_core::types::ContainerRef;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{LabelFilter, WatchdogSettings};
use crate::docker::RuntimeClient;
use crate::error::WatchdogError;
use crate::event::HealthEvent;

/// Timer-driven producer of [`HealthEvent`]s.
pub struct Poller<D: RuntimeClient> {
    client: Arc<D>,
    filter: LabelFilter,
    interval: Duration,
    timeout: Duration,
    max_consecutive_failures: u32,
}

impl<D: RuntimeClient> Poller<D> {
    /// Creates a poller from the watchdog settings.
    pub fn new(client: Arc<D>, settings: &WatchdogSettings) -> Self {
        Self {
            client,
            filter: settings.filter.clone(),
            interval: settings.interval,
            timeout: settings.timeout,
            max_consecutive_failures: settings.max_consecutive_failures,
        }
    }

    /// Issues one bounded-time query for unhealthy containers.
    ///
    /// # Errors
    ///
    /// - `WatchdogError::Timeout` if the runtime does not answer within the
    ///   configured timeout
    /// - whatever the runtime client reports otherwise
    pub async fn poll_once(&self) -> Result<Vec<ContainerRef>, WatchdogError> {
        match tokio::time::timeout(self.timeout, self.client.list_unhealthy(&self.filter)).await {
            Ok(result) => result,
            Err(_) => Err(WatchdogError::Timeout {
                operation: "list unhealthy containers",
                timeout: self.timeout,
            }),
        }
    }

    /// Runs the poll loop until cancelled.
    ///
    /// The first poll starts immediately, then one per interval tick.
    /// Cancellation is observed while waiting for the tick, during a poll and
    /// while blocked handing an event to the consumer.
    ///
    /// # Errors
    ///
    /// - `WatchdogError::Channel` if the consumer dropped the receiver
    /// - `WatchdogError::PollerExhausted` if the consecutive-failure budget
    ///   ran out
    pub async fn run(
        self,
        tx: mpsc::Sender<HealthEvent>,
        cancel: CancellationToken,
    ) -> Result<(), WatchdogError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cycle: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            filter = %self.filter,
            "poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            cycle += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(containers) => {
                    consecutive_failures = 0;
                    metrics::counter!(m::POLLER_POLLS_TOTAL, m::LABEL_RESULT => m::RESULT_SUCCESS)
                        .increment(1);
                    metrics::gauge!(m::POLLER_CONSECUTIVE_FAILURES).set(0.0);
                    debug!(cycle, unhealthy = containers.len(), "poll completed");

                    for container in containers {
                        let event = HealthEvent::new(container, cycle);
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                info!("poller cancelled while delivering events");
                                return Ok(());
                            }
                            sent = tx.send(event) => {
                                if sent.is_err() {
                                    return Err(WatchdogError::Channel(
                                        "health event receiver dropped".to_owned(),
                                    ));
                                }
                            }
                        }
                        metrics::counter!(m::POLLER_UNHEALTHY_EVENTS_TOTAL).increment(1);
                    }
                }
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    metrics::counter!(m::POLLER_POLLS_TOTAL, m::LABEL_RESULT => m::RESULT_FAILURE)
                        .increment(1);
                    metrics::gauge!(m::POLLER_CONSECUTIVE_FAILURES)
                        .set(f64::from(consecutive_failures));
                    warn!(
                        cycle,
                        consecutive_failures,
                        error = %e,
                        "error fetching unhealthy containers, skipping poll cycle"
                    );

                    if self.max_consecutive_failures > 0
                        && consecutive_failures >= self.max_consecutive_failures
                    {
                        error!(
                            consecutive_failures,
                            "consecutive poll failure limit reached, poller giving up"
                        );
                        return Err(WatchdogError::PollerExhausted {
                            failures: consecutive_failures,
                            last_error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(cycles = cycle, "poller cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchdogSettingsBuilder;
    use crate::docker::MockRuntimeClient;

    fn web() -> ContainerRef {
        ContainerRef::new("abc123", "web-1")
    }

    fn db() -> ContainerRef {
        ContainerRef::new("xyz789", "db-1")
    }

    fn settings() -> WatchdogSettings {
        WatchdogSettingsBuilder::new()
            .interval(Duration::from_secs(61))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap()
    }

    fn spawn_poller(
        client: Arc<MockRuntimeClient>,
        settings: &WatchdogSettings,
    ) -> (
        mpsc::Receiver<HealthEvent>,
        CancellationToken,
        tokio::task::JoinHandle<Result<(), WatchdogError>>,
    ) {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let poller = Poller::new(client, settings);
        let handle = tokio::spawn(poller.run(tx, cancel.clone()));
        (rx, cancel, handle)
    }

    #[tokio::test]
    async fn poll_once_passes_label_filter_to_runtime() {
        let client = Arc::new(MockRuntimeClient::new().with_containers(vec![web()]));
        let settings = WatchdogSettingsBuilder::new()
            .filter(LabelFilter::Label("team=payments".to_owned()))
            .build()
            .unwrap();
        let poller = Poller::new(Arc::clone(&client), &settings);

        let containers = poller.poll_once().await.unwrap();

        assert_eq!(containers, vec![web()]);
        assert_eq!(
            client.list_calls(),
            vec![LabelFilter::Label("team=payments".to_owned())]
        );
    }

    #[tokio::test]
    async fn poll_once_without_filter_sends_no_label() {
        let client = Arc::new(MockRuntimeClient::new());
        let poller = Poller::new(Arc::clone(&client), &settings());
        poller.poll_once().await.unwrap();
        assert_eq!(client.list_calls(), vec![LabelFilter::All]);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_once_times_out_on_slow_runtime() {
        let client = Arc::new(MockRuntimeClient::new().with_list_delay(Duration::from_secs(120)));
        let poller = Poller::new(client, &settings());

        let err = poller.poll_once().await.unwrap_err();

        assert!(matches!(
            err,
            WatchdogError::Timeout {
                operation: "list unhealthy containers",
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_runs_immediately() {
        let client = Arc::new(MockRuntimeClient::new().with_containers(vec![web()]));
        let (mut rx, cancel, handle) = spawn_poller(Arc::clone(&client), &settings());

        let start = tokio::time::Instant::now();
        let event = rx.recv().await.unwrap();

        assert_eq!(event.container, web());
        assert_eq!(event.cycle, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn emits_one_event_per_container_in_order() {
        let client = Arc::new(MockRuntimeClient::new().with_list_script(vec![Ok(vec![web(), db()])]));
        let (mut rx, cancel, handle) = spawn_poller(client, &settings());

        assert_eq!(rx.recv().await.unwrap().container, web());
        assert_eq!(rx.recv().await.unwrap().container, db());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn polls_once_per_interval() {
        let client = Arc::new(MockRuntimeClient::new().with_containers(vec![web()]));
        let (mut rx, cancel, handle) = spawn_poller(Arc::clone(&client), &settings());

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();

        assert_eq!(second.cycle, first.cycle + 1);
        assert_eq!(client.list_calls().len(), 2);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_poll_emits_nothing_and_loop_continues() {
        let client = Arc::new(MockRuntimeClient::new().with_list_script(vec![
            Err("connection refused".to_owned()),
            Ok(vec![web()]),
        ]));
        let (mut rx, cancel, handle) = spawn_poller(Arc::clone(&client), &settings());

        let event = rx.recv().await.unwrap();

        // 첫 사이클은 실패로 건너뛰고 두 번째 사이클에서 방출
        assert_eq!(event.cycle, 2);
        assert_eq!(client.list_calls().len(), 2);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_while_waiting_for_tick_stops_polling() {
        let client = Arc::new(MockRuntimeClient::new());
        let (_rx, cancel, handle) = spawn_poller(Arc::clone(&client), &settings());

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(client.list_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_never_polls() {
        let client = Arc::new(MockRuntimeClient::new());
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        Poller::new(Arc::clone(&client), &settings())
            .run(tx, cancel)
            .await
            .unwrap();

        assert!(client.list_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_while_blocked_on_full_channel() {
        let client = Arc::new(MockRuntimeClient::new().with_containers(vec![web(), db()]));
        // 수신하지 않으므로 두 번째 이벤트 전송에서 블록된다
        let (_rx, cancel, handle) = spawn_poller(client, &settings());

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(result.is_ok(), "poller should exit promptly on cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_slow_poll() {
        let client = Arc::new(MockRuntimeClient::new().with_list_delay(Duration::from_secs(20)));
        let (_rx, cancel, handle) = spawn_poller(Arc::clone(&client), &settings());

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(client.list_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_receiver_is_a_channel_error() {
        let client = Arc::new(MockRuntimeClient::new().with_containers(vec![web()]));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = Poller::new(client, &settings())
            .run(tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WatchdogError::Channel(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_consecutive_failure_budget() {
        let client = Arc::new(MockRuntimeClient::new().with_list_script(vec![
            Err("socket closed".to_owned()),
            Err("socket closed".to_owned()),
            Err("socket closed".to_owned()),
        ]));
        let settings = WatchdogSettingsBuilder::new()
            .max_consecutive_failures(3)
            .build()
            .unwrap();
        let (tx, _rx) = mpsc::channel(1);

        let err = Poller::new(Arc::clone(&client), &settings)
            .run(tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WatchdogError::PollerExhausted { failures: 3, .. }
        ));
        assert_eq!(client.list_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_poll_resets_failure_run() {
        let client = Arc::new(MockRuntimeClient::new().with_list_script(vec![
            Err("busy".to_owned()),
            Ok(Vec::new()),
            Err("busy".to_owned()),
            Ok(Vec::new()),
            Err("busy".to_owned()),
        ]));
        let settings = WatchdogSettingsBuilder::new()
            .max_consecutive_failures(2)
            .build()
            .unwrap();
        let (_rx, cancel, handle) = spawn_poller(Arc::clone(&client), &settings);

        // 61초 간격으로 6번 폴링되도록 기다린다
        tokio::time::sleep(Duration::from_secs(61 * 5 + 1)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(client.list_calls().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_failures_by_default() {
        let client = Arc::new(
            MockRuntimeClient::new()
                .with_list_script((0..10).map(|_| Err("down".to_owned())).collect()),
        );
        let (_rx, cancel, handle) = spawn_poller(Arc::clone(&client), &settings());

        tokio::time::sleep(Duration::from_secs(61 * 9 + 1)).await;
        assert!(!handle.is_finished());
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(client.list_calls().len(), 10);
    }
}
