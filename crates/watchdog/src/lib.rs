//! autoheal 워치독 -- unhealthy 컨테이너 폴링과 연속 관측 기반 재시작
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`WatchdogError`)
//! - [`config`]: Runtime settings (`WatchdogSettings`, builder, `LabelFilter`)
//! - [`event`]: Unhealthy observations (`HealthEvent`)
//! - [`docker`]: Runtime API abstraction (`RuntimeClient` trait, `BollardRuntimeClient`)
//! - [`poller`]: Timer-driven unhealthy polling (`Poller`)
//! - [`tracker`]: Streak accounting and restarts (`StreakCounter`, `Tracker`)
//! - [`watchdog`]: Supervisor (`Watchdog`, `WatchdogBuilder`)
//!
//! # Architecture
//!
//! ```text
//!            tick / cancel
//!                 │
//!             ┌───▼────┐  list_unhealthy   ┌───────────────┐
//!             │ Poller ├──────────────────►│               │
//!             └───┬────┘                   │ RuntimeClient │
//!                 │ HealthEvent            │               │
//!             mpsc(1)                      │               │
//!                 │                        │               │
//!             ┌───▼─────┐  restart         │               │
//!             │ Tracker ├─────────────────►│               │
//!             └─────────┘                  └───────────────┘
//! ```

pub mod config;
pub mod docker;
pub mod error;
pub mod event;
pub mod poller;
pub mod tracker;
pub mod watchdog;

// --- Public API Re-exports ---

// Supervisor
pub use watchdog::{EVENT_CHANNEL_CAPACITY, Watchdog, WatchdogBuilder, WatchdogReport};

// Configuration
pub use config::{LabelFilter, WatchdogSettings, WatchdogSettingsBuilder};

// Error
pub use error::WatchdogError;

// Events
pub use event::HealthEvent;

// Runtime API
pub use docker::{BollardRuntimeClient, RuntimeClient, unhealthy_filters};

// Components
pub use poller::Poller;
pub use tracker::{Observation, StreakCounter, Tracker};
