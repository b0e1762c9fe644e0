//! autoheal 공통 크레이트
//!
//! 워치독과 데몬이 공유하는 에러, 설정, 도메인 타입, 메트릭 이름을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{AutohealError, ConfigError, RuntimeError};

// 설정
pub use config::{
    AutohealConfig, FILTER_ALL, GeneralConfig, MetricsConfig, RejectedEnvVar, WatchdogConfig,
};

// 도메인 타입
pub use types::ContainerRef;
