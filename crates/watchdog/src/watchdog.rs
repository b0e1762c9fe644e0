//! 워치독 -- 폴러와 트래커를 묶어 실행하고 종료를 감독합니다.
//!
//! [`Watchdog::run`]은 두 태스크를 스폰한 뒤 어느 쪽이 먼저 끝나는지 관찰합니다.
//! 취소 토큰이 취소되지 않았는데 폴러가 끝났다면 (에러, 패닉, 예기치 않은 정상 종료)
//! 워치독 전체가 실패로 끝납니다. 감시를 멈춘 워치독이 살아 있는 상태로 남지 않도록
//! 호출자는 이 에러를 프로세스 종료로 이어야 합니다.
//!
//! # 사용 예시
//! ```ignore
//! use std::sync::Arc;
//! use autoheal_watchdog::{BollardRuntimeClient, WatchdogBuilder, WatchdogSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! let settings = WatchdogSettings::default();
//! let client = BollardRuntimeClient::connect(&settings.socket, settings.timeout)?;
//! let watchdog = WatchdogBuilder::new()
//!     .settings(settings)
//!     .runtime_client(Arc::new(client))
//!     .build()?;
//!
//! let report = watchdog.run(CancellationToken::new()).await?;
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::WatchdogSettings;
use crate::docker::RuntimeClient;
use crate::error::WatchdogError;
use crate::poller::Poller;
use crate::tracker::{StreakCounter, Tracker};

/// 폴러와 트래커 사이 이벤트 채널 용량
///
/// 1이면 폴러는 트래커가 직전 이벤트를 가져갈 때까지 기다립니다.
pub const EVENT_CHANNEL_CAPACITY: usize = 1;

/// 정상 종료된 워치독의 실행 결과
#[derive(Debug)]
pub struct WatchdogReport {
    /// 트래커가 처리한 이벤트 수
    pub events_processed: u64,
    /// 시도된 재시작 수
    pub restarts_attempted: u64,
    /// 실패한 재시작 수
    pub restart_failures: u64,
    /// 종료 시점의 스트릭 카운터
    pub streaks: StreakCounter,
}

/// unhealthy 컨테이너 워치독
pub struct Watchdog<D: RuntimeClient> {
    settings: WatchdogSettings,
    client: Arc<D>,
}

impl<D: RuntimeClient> Watchdog<D> {
    /// 실행 설정
    pub fn settings(&self) -> &WatchdogSettings {
        &self.settings
    }

    /// 공유 런타임 클라이언트
    pub fn client(&self) -> Arc<D> {
        Arc::clone(&self.client)
    }

    /// 런타임에 연결할 수 있는지 제한 시간 안에 확인합니다.
    ///
    /// # Errors
    ///
    /// - `WatchdogError::Connection`: 런타임 응답 실패
    /// - `WatchdogError::Timeout`: 제한 시간 초과
    pub async fn verify_runtime(&self) -> Result<(), WatchdogError> {
        match tokio::time::timeout(self.settings.timeout, self.client.ping()).await {
            Ok(result) => result,
            Err(_) => Err(WatchdogError::Timeout {
                operation: "ping runtime",
                timeout: self.settings.timeout,
            }),
        }
    }

    /// 폴러와 트래커를 실행하고 종료될 때까지 감독합니다.
    ///
    /// `cancel`이 취소되면 폴러가 멈추고, 채널이 닫히면 트래커가 남은 이벤트를
    /// 처리한 뒤 멈춥니다.
    ///
    /// # Errors
    ///
    /// 취소되지 않은 상태에서 폴러나 트래커가 끝나면 에러를 반환하며,
    /// 이때 `cancel`도 취소됩니다.
    pub async fn run(self, cancel: CancellationToken) -> Result<WatchdogReport, WatchdogError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let poller = Poller::new(Arc::clone(&self.client), &self.settings);
        let tracker = Tracker::new(
            Arc::clone(&self.client),
            self.settings.unhealthy_count,
            self.settings.timeout,
        );

        info!(
            interval = ?self.settings.interval,
            timeout = ?self.settings.timeout,
            unhealthy_count = self.settings.unhealthy_count,
            filter = %self.settings.filter,
            "watchdog starting"
        );

        let mut poller_task = tokio::spawn(poller.run(tx, cancel.clone()));
        let mut tracker_task = tokio::spawn(tracker.run(rx));

        tokio::select! {
            biased;
            poller_result = &mut poller_task => {
                // 폴러가 끝나면 송신측이 닫히므로 트래커는 남은 이벤트를 처리하고 끝난다
                let poller_outcome = match poller_result {
                    Ok(Ok(())) if cancel.is_cancelled() => Ok(()),
                    Ok(Ok(())) => Err(WatchdogError::Task(
                        "poller exited without cancellation".to_owned(),
                    )),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(WatchdogError::Task(format!("poller task failed: {e}"))),
                };

                if let Err(e) = &poller_outcome {
                    error!(error = %e, "poller stopped unexpectedly, shutting down watchdog");
                    cancel.cancel();
                }

                let tracker = tracker_task
                    .await
                    .map_err(|e| WatchdogError::Task(format!("tracker task failed: {e}")))?;
                poller_outcome?;

                let report = WatchdogReport {
                    events_processed: tracker.events_processed(),
                    restarts_attempted: tracker.restarts_attempted(),
                    restart_failures: tracker.restart_failures(),
                    streaks: tracker.into_counter(),
                };
                info!(
                    events = report.events_processed,
                    restarts = report.restarts_attempted,
                    failures = report.restart_failures,
                    "watchdog stopped"
                );
                Ok(report)
            }
            tracker_result = &mut tracker_task => {
                cancel.cancel();
                let reason = match tracker_result {
                    Ok(_) => "tracker exited before poller".to_owned(),
                    Err(e) => format!("tracker task failed: {e}"),
                };
                error!(reason = %reason, "tracker stopped unexpectedly, shutting down watchdog");
                if let Err(e) = poller_task.await {
                    error!(error = %e, "poller task failed during shutdown");
                }
                Err(WatchdogError::Task(reason))
            }
        }
    }
}

/// 워치독 빌더
pub struct WatchdogBuilder<D: RuntimeClient> {
    settings: WatchdogSettings,
    client: Option<Arc<D>>,
}

impl<D: RuntimeClient> Default for WatchdogBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: RuntimeClient> WatchdogBuilder<D> {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: WatchdogSettings::default(),
            client: None,
        }
    }

    /// 실행 설정을 지정합니다.
    pub fn settings(mut self, settings: WatchdogSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 런타임 클라이언트를 지정합니다.
    pub fn runtime_client(mut self, client: Arc<D>) -> Self {
        self.client = Some(client);
        self
    }

    /// 워치독을 빌드합니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 런타임 클라이언트가 없으면 `WatchdogError::Config`.
    pub fn build(self) -> Result<Watchdog<D>, WatchdogError> {
        self.settings.validate()?;

        let client = self.client.ok_or_else(|| WatchdogError::Config {
            field: "runtime_client".to_owned(),
            reason: "runtime client must be provided".to_owned(),
        })?;

        Ok(Watchdog {
            settings: self.settings,
            client,
        })
    }
}
