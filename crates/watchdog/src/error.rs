//! 워치독 에러 타입
//!
//! [`WatchdogError`]는 워치독 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<WatchdogError> for AutohealError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use std::time::Duration;

use autoheal_core::error::{AutohealError, ConfigError, RuntimeError};

/// 워치독 도메인 에러
///
/// 런타임 조회/재시작 실패, 타임아웃, 설정, 채널, 태스크 종료 에러를 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// 런타임 소켓 연결 실패
    #[error("runtime connection error: {0}")]
    Connection(String),

    /// unhealthy 컨테이너 조회 실패 (런타임이 보고한 에러 포함)
    #[error("query unhealthy containers failed: {0}")]
    Query(String),

    /// 컨테이너 재시작 실패
    #[error("restart failed for container '{container_id}': {reason}")]
    Restart {
        /// 대상 컨테이너 ID
        container_id: String,
        /// 실패 사유
        reason: String,
    },

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 유효하지 않은 컨테이너 ID
    #[error("invalid container id: {0}")]
    InvalidContainerId(String),

    /// 런타임 호출이 제한 시간 안에 끝나지 않음
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// 호출 이름 (예: "list unhealthy containers")
        operation: &'static str,
        /// 적용된 제한 시간
        timeout: Duration,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 연속 조회 실패 허용 횟수 초과
    #[error("poller gave up after {failures} consecutive failed polls: {last_error}")]
    PollerExhausted {
        /// 연속 실패 횟수
        failures: u32,
        /// 마지막 실패 사유
        last_error: String,
    },

    /// 백그라운드 태스크 비정상 종료
    #[error("task failed: {0}")]
    Task(String),
}

impl From<WatchdogError> for AutohealError {
    fn from(err: WatchdogError) -> Self {
        match err {
            WatchdogError::Connection(msg) => AutohealError::Runtime(RuntimeError::Connection(msg)),
            WatchdogError::Query(msg) => AutohealError::Runtime(RuntimeError::Query(msg)),
            WatchdogError::Restart {
                container_id,
                reason,
            } => AutohealError::Runtime(RuntimeError::RestartFailed {
                container_id,
                reason,
            }),
            WatchdogError::ContainerNotFound(id) => {
                AutohealError::Runtime(RuntimeError::NotFound(id))
            }
            WatchdogError::Config { field, reason } => {
                AutohealError::Config(ConfigError::InvalidValue { field, reason })
            }
            err @ (WatchdogError::InvalidContainerId(_) | WatchdogError::Timeout { .. }) => {
                AutohealError::Runtime(RuntimeError::Query(err.to_string()))
            }
            err @ (WatchdogError::Channel(_)
            | WatchdogError::PollerExhausted { .. }
            | WatchdogError::Task(_)) => AutohealError::Runtime(RuntimeError::Task(err.to_string())),
        }
    }
}
