//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 컴포넌트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았으면 호출은 no-op 입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `autoheal_`
//! - 컴포넌트명: `poller_`, `tracker_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 성공 레이블 값
pub const RESULT_SUCCESS: &str = "success";

/// 실패 레이블 값
pub const RESULT_FAILURE: &str = "failure";

// ─── Poller 메트릭 ─────────────────────────────────────────────────

/// Poller: 실행된 폴링 횟수 (counter, label: result)
pub const POLLER_POLLS_TOTAL: &str = "autoheal_poller_polls_total";

/// Poller: 방출된 unhealthy 관측 이벤트 수 (counter)
pub const POLLER_UNHEALTHY_EVENTS_TOTAL: &str = "autoheal_poller_unhealthy_events_total";

/// Poller: 현재 연속 조회 실패 횟수 (gauge)
pub const POLLER_CONSECUTIVE_FAILURES: &str = "autoheal_poller_consecutive_failures";

// ─── Tracker 메트릭 ────────────────────────────────────────────────

/// Tracker: 재시작 시도 수 (counter, label: result)
pub const TRACKER_RESTARTS_TOTAL: &str = "autoheal_tracker_restarts_total";

/// Tracker: 스트릭을 추적 중인 컨테이너 수 (gauge)
pub const TRACKER_TRACKED_CONTAINERS: &str = "autoheal_tracker_tracked_containers";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "autoheal_daemon_build_info";

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "autoheal_daemon_uptime_seconds";

/// 모든 메트릭 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Poller
    describe_counter!(
        POLLER_POLLS_TOTAL,
        "Total number of unhealthy-container polls by result"
    );
    describe_counter!(
        POLLER_UNHEALTHY_EVENTS_TOTAL,
        "Total number of unhealthy container observations emitted"
    );
    describe_gauge!(
        POLLER_CONSECUTIVE_FAILURES,
        "Number of consecutive failed polls"
    );

    // Tracker
    describe_counter!(
        TRACKER_RESTARTS_TOTAL,
        "Total number of container restarts attempted by result"
    );
    describe_gauge!(
        TRACKER_TRACKED_CONTAINERS,
        "Number of containers with an open unhealthy streak"
    );

    // Daemon
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
}
