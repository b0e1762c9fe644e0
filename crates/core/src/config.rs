//! 설정 관리 -- autoheal.toml 파싱 및 런타임 설정
//!
//! [`AutohealConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//! 프로세스 시작 시 한 번 구성되고 이후에는 변경되지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`AUTOHEAL_WATCHDOG_INTERVAL_SECS=30` 형식)
//! 3. 설정 파일 (`autoheal.toml`, 선택)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), autoheal_core::error::AutohealError> {
//! use autoheal_core::config::AutohealConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드 + 검증
//! let config = AutohealConfig::load("autoheal.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = AutohealConfig::parse("[watchdog]\nunhealthy_count = 5")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AutohealError, ConfigError};

/// 라벨 필터를 사용하지 않음을 나타내는 값
pub const FILTER_ALL: &str = "all";

/// 설정 상한값 상수
const MAX_INTERVAL_SECS: u64 = 86_400;
const MAX_TIMEOUT_SECS: u64 = 3_600;

/// 파싱할 수 없어 적용되지 않은 환경변수
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEnvVar {
    /// 환경변수 이름
    pub key: &'static str,
    /// 설정된 원본 값
    pub value: String,
    /// 기대한 타입
    pub expected: &'static str,
}

impl fmt::Display for RejectedEnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ignoring {}={:?}: expected {}",
            self.key, self.value, self.expected
        )
    }
}

/// autoheal 통합 설정
///
/// `autoheal.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutohealConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 워치독 설정
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AutohealConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용한 뒤 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AutohealError> {
        let mut config = Self::from_file(path).await?;
        for rejected in config.apply_env_overrides() {
            warn!(
                env_key = rejected.key,
                value = rejected.value.as_str(),
                expected = rejected.expected,
                "failed to parse env var, ignoring"
            );
        }
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 읽습니다 (오버라이드/검증 없음).
    ///
    /// CLI 오버라이드를 적용한 뒤 한 번에 검증하려는 호출자를 위한 함수입니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AutohealError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AutohealError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                AutohealError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, AutohealError> {
        toml::from_str(toml_str).map_err(|e| {
            AutohealError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `AUTOHEAL_{SECTION}_{FIELD}`
    ///
    /// 파싱할 수 없는 값은 적용하지 않고 반환 목록에 담습니다. 로깅이
    /// 초기화되기 전에 호출될 수 있으므로 보고는 호출자가 합니다.
    #[must_use = "rejected env values must be reported"]
    pub fn apply_env_overrides(&mut self) -> Vec<RejectedEnvVar> {
        let mut rejected = Vec::new();

        // General
        override_string(&mut self.general.log_level, "AUTOHEAL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "AUTOHEAL_GENERAL_LOG_FORMAT");

        // Watchdog
        override_parsed(
            &mut self.watchdog.interval_secs,
            "AUTOHEAL_WATCHDOG_INTERVAL_SECS",
            "u64",
            &mut rejected,
        );
        override_parsed(
            &mut self.watchdog.timeout_secs,
            "AUTOHEAL_WATCHDOG_TIMEOUT_SECS",
            "u64",
            &mut rejected,
        );
        override_parsed(
            &mut self.watchdog.unhealthy_count,
            "AUTOHEAL_WATCHDOG_UNHEALTHY_COUNT",
            "u32",
            &mut rejected,
        );
        override_string(&mut self.watchdog.socket, "AUTOHEAL_WATCHDOG_SOCKET");
        override_string(&mut self.watchdog.filter, "AUTOHEAL_WATCHDOG_FILTER");
        override_parsed(
            &mut self.watchdog.max_consecutive_failures,
            "AUTOHEAL_WATCHDOG_MAX_CONSECUTIVE_FAILURES",
            "u32",
            &mut rejected,
        );

        // Metrics
        override_parsed(
            &mut self.metrics.enabled,
            "AUTOHEAL_METRICS_ENABLED",
            "bool",
            &mut rejected,
        );
        override_string(&mut self.metrics.listen_addr, "AUTOHEAL_METRICS_LISTEN_ADDR");
        override_parsed(
            &mut self.metrics.port,
            "AUTOHEAL_METRICS_PORT",
            "u16",
            &mut rejected,
        );

        rejected
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), AutohealError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.watchdog.validate()?;

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must be greater than 0".to_owned()));
            }
            if self.metrics.endpoint != "/metrics" {
                return Err(invalid(
                    "metrics.endpoint",
                    "only '/metrics' is supported".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 워치독 설정
///
/// 폴링 주기, 런타임 호출 타임아웃, 재시작 임계값, 소켓 경로, 라벨 필터.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// 폴링 주기 (초)
    pub interval_secs: u64,
    /// 런타임 호출(조회, 재시작)마다 적용되는 타임아웃 (초)
    pub timeout_secs: u64,
    /// 재시작 전까지 필요한 연속 unhealthy 관측 횟수
    pub unhealthy_count: u32,
    /// 런타임 소켓 경로
    pub socket: String,
    /// 라벨 필터 (`"all"`이면 필터 없음)
    pub filter: String,
    /// 연속 조회 실패 허용 횟수 (0이면 무제한)
    pub max_consecutive_failures: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_secs: 61,
            timeout_secs: 30,
            unhealthy_count: 3,
            socket: "/var/run/docker.sock".to_owned(),
            filter: FILTER_ALL.to_owned(),
            max_consecutive_failures: 0,
        }
    }
}

impl WatchdogConfig {
    /// 워치독 섹션만 검증합니다.
    pub fn validate(&self) -> Result<(), AutohealError> {
        if self.interval_secs == 0 || self.interval_secs > MAX_INTERVAL_SECS {
            return Err(invalid(
                "watchdog.interval_secs",
                format!("must be 1-{MAX_INTERVAL_SECS}"),
            ));
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(invalid(
                "watchdog.timeout_secs",
                format!("must be 1-{MAX_TIMEOUT_SECS}"),
            ));
        }

        if self.unhealthy_count == 0 {
            return Err(invalid(
                "watchdog.unhealthy_count",
                "must be at least 1".to_owned(),
            ));
        }

        if self.socket.trim().is_empty() {
            return Err(invalid("watchdog.socket", "must not be empty".to_owned()));
        }

        if self.filter.trim().is_empty() {
            return Err(invalid(
                "watchdog.filter",
                format!("must not be empty (use '{FILTER_ALL}' to disable filtering)"),
            ));
        }

        Ok(())
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 바인드 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

fn invalid(field: &str, reason: String) -> AutohealError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(
    target: &mut T,
    env_key: &'static str,
    expected: &'static str,
    rejected: &mut Vec<RejectedEnvVar>,
) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => rejected.push(RejectedEnvVar {
                key: env_key,
                value: val,
                expected,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = AutohealConfig::default();
        assert_eq!(config.watchdog.interval_secs, 61);
        assert_eq!(config.watchdog.timeout_secs, 30);
        assert_eq!(config.watchdog.unhealthy_count, 3);
        assert_eq!(config.watchdog.socket, "/var/run/docker.sock");
        assert_eq!(config.watchdog.filter, FILTER_ALL);
        assert_eq!(config.watchdog.max_consecutive_failures, 0);
        assert!(!config.metrics.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_string_uses_defaults() {
        let config = AutohealConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.watchdog.unhealthy_count, 3);
    }

    #[test]
    fn parse_partial_watchdog_section() {
        let toml = r#"
[watchdog]
interval_secs = 10
filter = "team=payments"
"#;
        let config = AutohealConfig::parse(toml).unwrap();
        assert_eq!(config.watchdog.interval_secs, 10);
        assert_eq!(config.watchdog.filter, "team=payments");
        // 지정하지 않은 필드는 기본값
        assert_eq!(config.watchdog.timeout_secs, 30);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = AutohealConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            AutohealError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = AutohealConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = AutohealConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_unhealthy_count() {
        let mut config = AutohealConfig::default();
        config.watchdog.unhealthy_count = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unhealthy_count"));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = AutohealConfig::default();
        config.watchdog.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_timeout_out_of_range() {
        let mut config = AutohealConfig::default();
        config.watchdog.timeout_secs = MAX_TIMEOUT_SECS + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn validate_rejects_empty_socket_and_filter() {
        let mut config = AutohealConfig::default();
        config.watchdog.socket = "  ".to_owned();
        assert!(config.validate().is_err());

        let mut config = AutohealConfig::default();
        config.watchdog.filter = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watchdog.filter"));
    }

    #[test]
    fn validate_metrics_only_when_enabled() {
        let mut config = AutohealConfig::default();
        config.metrics.port = 0;
        config.validate().unwrap();

        config.metrics.enabled = true;
        assert!(config.validate().is_err());

        config.metrics.port = 9464;
        config.metrics.endpoint = "/stats".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.endpoint"));
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        // SAFETY: Test isolation - serial 테스트에서 설정 후 정리
        unsafe {
            std::env::set_var("AUTOHEAL_WATCHDOG_UNHEALTHY_COUNT", "5");
            std::env::set_var("AUTOHEAL_WATCHDOG_FILTER", "autoheal=true");
            std::env::set_var("AUTOHEAL_METRICS_ENABLED", "true");
        }

        let mut config = AutohealConfig::default();
        let rejected = config.apply_env_overrides();

        unsafe {
            std::env::remove_var("AUTOHEAL_WATCHDOG_UNHEALTHY_COUNT");
            std::env::remove_var("AUTOHEAL_WATCHDOG_FILTER");
            std::env::remove_var("AUTOHEAL_METRICS_ENABLED");
        }

        assert!(rejected.is_empty());
        assert_eq!(config.watchdog.unhealthy_count, 5);
        assert_eq!(config.watchdog.filter, "autoheal=true");
        assert!(config.metrics.enabled);
    }

    #[test]
    #[serial]
    fn env_override_with_unparsable_value_is_reported() {
        // SAFETY: Test isolation
        unsafe {
            std::env::set_var("AUTOHEAL_WATCHDOG_INTERVAL_SECS", "sixty");
            std::env::set_var("AUTOHEAL_METRICS_ENABLED", "yes");
        }

        let mut config = AutohealConfig::default();
        let rejected = config.apply_env_overrides();

        unsafe {
            std::env::remove_var("AUTOHEAL_WATCHDOG_INTERVAL_SECS");
            std::env::remove_var("AUTOHEAL_METRICS_ENABLED");
        }

        // 기존 값 유지, 거부된 키는 모두 보고
        assert_eq!(config.watchdog.interval_secs, 61);
        assert!(!config.metrics.enabled);
        assert_eq!(
            rejected,
            vec![
                RejectedEnvVar {
                    key: "AUTOHEAL_WATCHDOG_INTERVAL_SECS",
                    value: "sixty".to_owned(),
                    expected: "u64",
                },
                RejectedEnvVar {
                    key: "AUTOHEAL_METRICS_ENABLED",
                    value: "yes".to_owned(),
                    expected: "bool",
                },
            ]
        );
        assert_eq!(
            rejected[0].to_string(),
            "ignoring AUTOHEAL_WATCHDOG_INTERVAL_SECS=\"sixty\": expected u64"
        );
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = AutohealConfig::from_file("/nonexistent/autoheal.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AutohealError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    #[serial]
    async fn load_reads_file_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autoheal.toml");
        std::fs::write(&path, "[watchdog]\nunhealthy_count = 0\n").unwrap();

        let err = AutohealConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("unhealthy_count"));

        std::fs::write(&path, "[watchdog]\nunhealthy_count = 2\n").unwrap();
        let config = AutohealConfig::load(&path).await.unwrap();
        assert_eq!(config.watchdog.unhealthy_count, 2);
    }
}
