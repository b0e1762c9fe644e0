//! Unhealthy-container observations.
//!
//! A [`HealthEvent`] says that one container was reported unhealthy by one
//! poll cycle. Events only live on the channel between the poller and the
//! tracker.
//!
//! # Examples
//!
//! ```
//! use autoheal_core::types::ContainerRef;
//! use autoheal_watchdog::HealthEvent;
//!
//! let event = HealthEvent::new(ContainerRef::new("abc123", "web-1"), 7);
//! assert_eq!(event.container_id(), "abc123");
//! assert_eq!(event.cycle, 7);
//! ```

use std::fmt;
use std::time::SystemTime;

use autoheal_core::types::ContainerRef;

/// A single observation that a container was unhealthy at poll time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthEvent {
    /// 관측된 컨테이너
    pub container: ContainerRef,
    /// 이 관측을 만든 폴링 사이클 번호 (1부터 시작)
    pub cycle: u64,
    /// 관측 시각
    pub observed_at: SystemTime,
}

impl HealthEvent {
    /// Creates an event stamped with the current time.
    pub fn new(container: ContainerRef, cycle: u64) -> Self {
        Self {
            container,
            cycle,
            observed_at: SystemTime::now(),
        }
    }

    /// Container id the streak is keyed on.
    pub fn container_id(&self) -> &str {
        &self.container.id
    }
}

impl fmt::Display for HealthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhealthy {} (cycle {})", self.container, self.cycle)
    }
}
