//! 에러 타입 -- 도메인별 에러 정의

/// autoheal 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AutohealError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 런타임 에러
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 런타임 에러
///
/// 런타임 연결, 조회, 재시작 실패를 상위 레이어에 전달할 때 사용합니다.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// 런타임 소켓 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// unhealthy 컨테이너 조회 실패
    #[error("query failed: {0}")]
    Query(String),

    /// 컨테이너 재시작 실패
    #[error("restart failed for container '{container_id}': {reason}")]
    RestartFailed {
        container_id: String,
        reason: String,
    },

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    NotFound(String),

    /// 백그라운드 태스크 비정상 종료
    #[error("task failed: {0}")]
    Task(String),
}
