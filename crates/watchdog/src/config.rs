//! 워치독 설정
//!
//! [`WatchdogSettings`]는 core의 [`WatchdogConfig`]를 기반으로
//! 폴러와 트래커가 직접 사용하는 타입화된 설정을 제공합니다.
//! 한 번 만들어진 뒤에는 값으로 각 컴포넌트에 전달되며 변경되지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use autoheal_core::config::AutohealConfig;
//! use autoheal_watchdog::config::WatchdogSettings;
//!
//! let core_config = AutohealConfig::default();
//! let settings = WatchdogSettings::from_core(&core_config.watchdog);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use autoheal_core::config::{FILTER_ALL, WatchdogConfig};

use crate::error::WatchdogError;

/// 폴링 대상을 제한하는 라벨 필터
///
/// `All`은 필터를 사용하지 않는다는 뜻이며 런타임에 라벨 조건으로
/// 전달되지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LabelFilter {
    /// 모든 컨테이너
    #[default]
    All,
    /// 이 라벨(`key` 또는 `key=value`)을 가진 컨테이너만
    Label(String),
}

impl LabelFilter {
    /// 설정 문자열을 해석합니다. 정확히 `"all"`이거나 빈 문자열이면
    /// [`LabelFilter::All`], 그 외에는 값을 그대로 라벨 조건으로 씁니다.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() || raw == FILTER_ALL {
            Self::All
        } else {
            Self::Label(raw.to_owned())
        }
    }

    /// 런타임에 전달할 라벨 조건 (필터가 없으면 `None`)
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Label(label) => Some(label),
        }
    }
}

impl FromStr for LabelFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(FILTER_ALL),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// 워치독 실행 설정
#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    /// 폴링 주기
    pub interval: Duration,
    /// 런타임 호출 하나당 제한 시간 (조회와 재시작 모두)
    pub timeout: Duration,
    /// 재시작 전까지 필요한 연속 unhealthy 관측 횟수
    pub unhealthy_count: u32,
    /// 런타임 소켓 경로
    pub socket: String,
    /// 라벨 필터
    pub filter: LabelFilter,
    /// 연속 조회 실패 허용 횟수 (0이면 무제한)
    pub max_consecutive_failures: u32,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self::from_core(&WatchdogConfig::default())
    }
}

impl WatchdogSettings {
    /// core의 `WatchdogConfig`에서 실행 설정을 생성합니다.
    pub fn from_core(core: &WatchdogConfig) -> Self {
        Self {
            interval: Duration::from_secs(core.interval_secs),
            timeout: Duration::from_secs(core.timeout_secs),
            unhealthy_count: core.unhealthy_count,
            socket: core.socket.clone(),
            filter: LabelFilter::parse(&core.filter),
            max_consecutive_failures: core.max_consecutive_failures,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WatchdogError> {
        if self.interval.is_zero() {
            return Err(WatchdogError::Config {
                field: "interval".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.timeout.is_zero() {
            return Err(WatchdogError::Config {
                field: "timeout".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.unhealthy_count == 0 {
            return Err(WatchdogError::Config {
                field: "unhealthy_count".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        if self.socket.trim().is_empty() {
            return Err(WatchdogError::Config {
                field: "socket".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// 워치독 설정 빌더
#[derive(Default)]
pub struct WatchdogSettingsBuilder {
    settings: WatchdogSettings,
}

impl WatchdogSettingsBuilder {
    /// 기본값으로 시작하는 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 폴링 주기를 설정합니다.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.settings.interval = interval;
        self
    }

    /// 런타임 호출 제한 시간을 설정합니다.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// 재시작 임계값을 설정합니다.
    pub fn unhealthy_count(mut self, count: u32) -> Self {
        self.settings.unhealthy_count = count;
        self
    }

    /// 런타임 소켓 경로를 설정합니다.
    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.settings.socket = socket.into();
        self
    }

    /// 라벨 필터를 설정합니다.
    pub fn filter(mut self, filter: LabelFilter) -> Self {
        self.settings.filter = filter;
        self
    }

    /// 연속 조회 실패 허용 횟수를 설정합니다.
    pub fn max_consecutive_failures(mut self, max: u32) -> Self {
        self.settings.max_consecutive_failures = max;
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<WatchdogSettings, WatchdogError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
