//! 연속 unhealthy 관측 추적 및 재시작
//!
//! [`StreakCounter`]는 컨테이너 ID별 연속 관측 횟수를 보관하는 순수 상태 머신이고,
//! [`Tracker`]는 이벤트 채널을 소비하면서 임계값에 도달한 컨테이너를 재시작합니다.
//!
//! # 상태 머신
//! ```text
//!  Absent ──event──> Counting(1) ──event──> Counting(n+1)
//!     ▲                                        │ n+1 == threshold
//!     └──────── restart (성공/실패 무관) ◄──────┘
//! ```
//!
//! 맵에 남아 있는 항목의 카운트는 항상 `[1, threshold)` 범위입니다.
//! 임계값 도달 시 항목은 재시작을 결정하는 같은 단계에서 제거됩니다.
//!
//! 맵은 트래커 태스크 하나만 소유하므로 잠금이 필요 없습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use autoheal_core::metrics as m;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::docker::RuntimeClient;
use crate::error::WatchdogError;
use crate::event::HealthEvent;

/// 관측 하나를 반영한 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// 아직 임계값 미만, 현재 연속 횟수
    Counting {
        /// 이번 관측을 포함한 연속 횟수
        count: u32,
    },
    /// 임계값 도달, 항목은 이미 제거됨
    RestartDue,
}

/// 컨테이너 ID별 연속 unhealthy 관측 횟수
#[derive(Debug, Clone)]
pub struct StreakCounter {
    threshold: u32,
    streaks: HashMap<String, u32>,
}

impl StreakCounter {
    /// 임계값으로 카운터를 생성합니다. 0은 1로 취급합니다.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            streaks: HashMap::new(),
        }
    }

    /// 관측 하나를 반영합니다.
    ///
    /// 임계값에 도달하면 항목을 제거하고 [`Observation::RestartDue`]를 반환합니다.
    pub fn observe(&mut self, container_id: &str) -> Observation {
        let count = self.streaks.get(container_id).copied().unwrap_or(0) + 1;
        if count >= self.threshold {
            self.streaks.remove(container_id);
            Observation::RestartDue
        } else {
            self.streaks.insert(container_id.to_owned(), count);
            Observation::Counting { count }
        }
    }

    /// 컨테이너의 현재 연속 횟수 (추적 중이 아니면 `None`)
    pub fn count(&self, container_id: &str) -> Option<u32> {
        self.streaks.get(container_id).copied()
    }

    /// 추적 중인 컨테이너 수
    pub fn tracked(&self) -> usize {
        self.streaks.len()
    }

    /// 추적 중인 컨테이너가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.streaks.is_empty()
    }

    /// 재시작 임계값
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

/// 이벤트 소비자: 스트릭을 세고 임계값에 도달한 컨테이너를 재시작합니다.
pub struct Tracker<D: RuntimeClient> {
    client: Arc<D>,
    counter: StreakCounter,
    timeout: Duration,
    events_processed: u64,
    restarts_attempted: u64,
    restart_failures: u64,
}

impl<D: RuntimeClient> Tracker<D> {
    /// 트래커를 생성합니다.
    ///
    /// `timeout`은 재시작 호출의 제한 시간이자 런타임에 전달되는 종료 유예 시간입니다.
    pub fn new(client: Arc<D>, threshold: u32, timeout: Duration) -> Self {
        Self {
            client,
            counter: StreakCounter::new(threshold),
            timeout,
            events_processed: 0,
            restarts_attempted: 0,
            restart_failures: 0,
        }
    }

    /// 이벤트 하나를 처리합니다.
    ///
    /// 재시작 실패는 로그와 카운터에만 남고 에러로 전파되지 않습니다.
    pub async fn handle(&mut self, event: HealthEvent) {
        self.events_processed += 1;
        let observation = self.counter.observe(event.container_id());
        metrics::gauge!(m::TRACKER_TRACKED_CONTAINERS).set(self.counter.tracked() as f64);

        match observation {
            Observation::Counting { count } => {
                debug!(
                    container_id = %event.container.id,
                    container_name = %event.container.name,
                    count,
                    threshold = self.counter.threshold(),
                    "container unhealthy"
                );
            }
            Observation::RestartDue => {
                info!(
                    container_id = %event.container.id,
                    container_name = %event.container.name,
                    threshold = self.counter.threshold(),
                    "unhealthy threshold reached, restarting container"
                );
                self.restarts_attempted += 1;

                match self.restart(event.container_id()).await {
                    Ok(()) => {
                        metrics::counter!(m::TRACKER_RESTARTS_TOTAL, m::LABEL_RESULT => m::RESULT_SUCCESS)
                            .increment(1);
                        info!(container = %event.container, "container restarted");
                    }
                    Err(e) => {
                        self.restart_failures += 1;
                        metrics::counter!(m::TRACKER_RESTARTS_TOTAL, m::LABEL_RESULT => m::RESULT_FAILURE)
                            .increment(1);
                        error!(
                            container_id = %event.container.id,
                            container_name = %event.container.name,
                            error = %e,
                            "container restart failed"
                        );
                    }
                }
            }
        }
    }

    async fn restart(&self, container_id: &str) -> Result<(), WatchdogError> {
        match tokio::time::timeout(
            self.timeout,
            self.client.restart_container(container_id, self.timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(WatchdogError::Timeout {
                operation: "restart container",
                timeout: self.timeout,
            }),
        }
    }

    /// 채널이 닫힐 때까지 이벤트를 처리하고 최종 상태를 반환합니다.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HealthEvent>) -> Self {
        info!(threshold = self.counter.threshold(), "tracker started");
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!(
            events = self.events_processed,
            restarts = self.restarts_attempted,
            failures = self.restart_failures,
            "event channel closed, tracker stopped"
        );
        self
    }

    /// 스트릭 카운터 참조
    pub fn counter(&self) -> &StreakCounter {
        &self.counter
    }

    /// 최종 스트릭 카운터를 꺼냅니다.
    pub fn into_counter(self) -> StreakCounter {
        self.counter
    }

    /// 처리된 이벤트 수
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// 시도된 재시작 수
    pub fn restarts_attempted(&self) -> u64 {
        self.restarts_attempted
    }

    /// 실패한 재시작 수
    pub fn restart_failures(&self) -> u64 {
        self.restart_failures
    }
}
