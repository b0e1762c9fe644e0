//! Container runtime abstraction for testability.
//!
//! The [`RuntimeClient`] trait is the narrow interface the watchdog needs from
//! the container runtime: list unhealthy containers, restart one by id, and
//! check connectivity. Production code uses [`BollardRuntimeClient`] while
//! tests use `MockRuntimeClient`.
//!
//! # Architecture
//!
//! ```text
//!   ┌────────┐   ┌─────────┐
//!   │ Poller │   │ Tracker │
//!   └───┬────┘   └────┬────┘
//!       │  list       │  restart
//!       ▼             ▼
//!   ┌──────────────────────┐
//!   │ RuntimeClient (trait)│
//!   └──────────────────────┘
//!        │            │
//!        ▼            ▼
//!   ┌─────────┐   ┌──────┐
//!   │ Bollard │   │ Mock │
//!   └────┬────┘   └──────┘
//!        │
//!        ▼
//!   Docker Daemon (unix socket)
//! ```
//!
//! Trait methods do not enforce deadlines; callers wrap each call in
//! `tokio::time::timeout` with the configured timeout. Version negotiation
//! happens before any caller exists, so it takes the deadline itself.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use autoheal_core::types::ContainerRef;
use tracing::debug;

use crate::config::LabelFilter;
use crate::error::WatchdogError;

/// Lower bound for the HTTP client timeout handed to bollard.
///
/// The per-call deadline enforced by callers is the effective bound; this only
/// keeps bollard from cutting a call short first.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Validates a container ID before it reaches the runtime API.
///
/// Docker container IDs are 64-character hex strings (or shorter prefix forms).
fn validate_container_id(id: &str) -> Result<(), WatchdogError> {
    if id.is_empty() || id.len() > 64 {
        return Err(WatchdogError::InvalidContainerId(format!(
            "length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WatchdogError::InvalidContainerId(
            "contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// Builds the runtime-side filter set for an unhealthy-container listing.
///
/// Always constrains `health=unhealthy`; adds a `label` constraint only when a
/// real label filter is configured. The `"all"` sentinel never reaches the
/// runtime.
pub fn unhealthy_filters(filter: &LabelFilter) -> HashMap<String, Vec<String>> {
    let mut filters = HashMap::new();
    filters.insert("health".to_owned(), vec!["unhealthy".to_owned()]);
    if let Some(label) = filter.label() {
        filters.insert("label".to_owned(), vec![label.to_owned()]);
    }
    filters
}

/// Trait abstracting the container runtime operations the watchdog uses.
///
/// The trait is `Send + Sync + 'static` so one client can be shared through an
/// `Arc` by the poller and the tracker without external locking.
///
/// # Implementations
///
/// - [`BollardRuntimeClient`]: Docker Engine API over a unix socket
/// - `MockRuntimeClient`: scripted responses (available in tests only)
pub trait RuntimeClient: Send + Sync + 'static {
    /// Lists containers whose health status is `unhealthy`.
    ///
    /// The label filter is applied by the runtime, not client-side.
    ///
    /// # Errors
    ///
    /// Returns `WatchdogError::Query` if the runtime cannot be asked or
    /// reports an error.
    fn list_unhealthy(
        &self,
        filter: &LabelFilter,
    ) -> impl Future<Output = Result<Vec<ContainerRef>, WatchdogError>> + Send;

    /// Restarts a container.
    ///
    /// `timeout` is handed to the runtime as the grace period between the stop
    /// signal and a forced kill.
    ///
    /// # Errors
    ///
    /// - `WatchdogError::ContainerNotFound`: container no longer exists (404)
    /// - `WatchdogError::InvalidContainerId`: malformed id
    /// - `WatchdogError::Restart`: any other runtime failure
    fn restart_container(
        &self,
        id: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), WatchdogError>> + Send;

    /// Checks runtime connectivity.
    ///
    /// # Errors
    ///
    /// Returns `WatchdogError::Connection` if the runtime is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), WatchdogError>> + Send;
}

/// Production runtime client using `bollard`.
///
/// Talks to the Docker daemon over a unix socket.
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
/// use autoheal_watchdog::BollardRuntimeClient;
///
/// let client = BollardRuntimeClient::connect("/var/run/docker.sock", Duration::from_secs(30))?
///     .negotiate_version(Duration::from_secs(30))
///     .await?;
/// # Ok::<(), autoheal_watchdog::WatchdogError>(())
/// ```
pub struct BollardRuntimeClient {
    docker: bollard::Docker,
}

impl BollardRuntimeClient {
    /// Creates a client bound to the given socket path.
    ///
    /// No request is made yet; use [`negotiate_version`](Self::negotiate_version)
    /// or [`RuntimeClient::ping`] to verify the daemon is reachable.
    ///
    /// # Errors
    ///
    /// Returns `WatchdogError::Connection` if the client cannot be constructed.
    pub fn connect(socket_path: &str, timeout: Duration) -> Result<Self, WatchdogError> {
        let http_timeout = CONNECTION_TIMEOUT_SECS.max(timeout.as_secs());
        let docker = bollard::Docker::connect_with_socket(
            socket_path,
            http_timeout,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            WatchdogError::Connection(format!(
                "failed to create docker client for {socket_path}: {e}"
            ))
        })?;
        Ok(Self { docker })
    }

    /// Downgrades the client API version to what the daemon supports.
    ///
    /// # Errors
    ///
    /// - `WatchdogError::Connection` if the daemon cannot be reached or
    ///   reports an unusable version
    /// - `WatchdogError::Timeout` if the daemon does not answer within `timeout`
    pub async fn negotiate_version(self, timeout: Duration) -> Result<Self, WatchdogError> {
        let docker = tokio::time::timeout(timeout, self.docker.negotiate_version())
            .await
            .map_err(|_| WatchdogError::Timeout {
                operation: "negotiate api version",
                timeout,
            })?
            .map_err(|e| {
                WatchdogError::Connection(format!("docker api version negotiation failed: {e}"))
            })?;
        Ok(Self { docker })
    }
}

fn summary_to_ref(summary: bollard::models::ContainerSummary) -> Option<ContainerRef> {
    let id = summary.id.filter(|id| !id.is_empty())?;
    let name = summary
        .names
        .unwrap_or_default()
        .first()
        .map(|n| n.trim_start_matches('/').to_owned())
        .unwrap_or_default();
    Some(ContainerRef { id, name })
}

impl RuntimeClient for BollardRuntimeClient {
    async fn list_unhealthy(
        &self,
        filter: &LabelFilter,
    ) -> Result<Vec<ContainerRef>, WatchdogError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            filters: unhealthy_filters(filter),
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| WatchdogError::Query(format!("list containers failed: {e}")))?;

        let total = containers.len();
        let result: Vec<ContainerRef> = containers.into_iter().filter_map(summary_to_ref).collect();
        if result.len() != total {
            debug!(
                skipped = total - result.len(),
                "ignored container summaries without an id"
            );
        }
        Ok(result)
    }

    async fn restart_container(&self, id: &str, timeout: Duration) -> Result<(), WatchdogError> {
        validate_container_id(id)?;

        use bollard::container::RestartContainerOptions;

        let t = isize::try_from(timeout.as_secs()).unwrap_or(isize::MAX);
        self.docker
            .restart_container(id, Some(RestartContainerOptions { t }))
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => WatchdogError::ContainerNotFound(id.to_owned()),
                other => WatchdogError::Restart {
                    container_id: id.to_owned(),
                    reason: other.to_string(),
                },
            })
    }

    async fn ping(&self) -> Result<(), WatchdogError> {
        self.docker
            .ping()
            .await
            .map_err(|e| WatchdogError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// 테스트용 Mock 런타임 클라이언트
///
/// `list_unhealthy` 응답을 순서대로 스크립트할 수 있고,
/// 호출 인자(라벨 필터, 재시작 대상)를 기록합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockRuntimeClient {
    /// 순서대로 소비되는 조회 응답. 비어 있으면 `containers`를 반환
    list_script: std::sync::Mutex<std::collections::VecDeque<Result<Vec<ContainerRef>, String>>>,
    /// 스크립트가 없을 때 반환할 컨테이너 목록
    pub containers: Vec<ContainerRef>,
    /// 조회 응답 전 지연
    pub list_delay: Option<Duration>,
    /// 재시작 응답 전 지연
    pub restart_delay: Option<Duration>,
    /// 재시작 호출 시 실패를 시뮬레이션할지 여부
    pub fail_restarts: bool,
    /// ping 실패 여부
    pub fail_ping: bool,
    list_calls: std::sync::Mutex<Vec<LabelFilter>>,
    restarts: std::sync::Mutex<Vec<(String, Duration)>>,
}

#[cfg(test)]
impl MockRuntimeClient {
    /// 빈 컨테이너 목록으로 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 매 조회마다 반환할 컨테이너를 설정합니다.
    pub fn with_containers(mut self, containers: Vec<ContainerRef>) -> Self {
        self.containers = containers;
        self
    }

    /// 조회 응답 스크립트를 설정합니다. `Err`는 조회 실패를 뜻합니다.
    pub fn with_list_script(self, script: Vec<Result<Vec<ContainerRef>, String>>) -> Self {
        *self.list_script.lock().unwrap() = script.into();
        self
    }

    /// 조회 지연을 설정합니다.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// 재시작 지연을 설정합니다.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = Some(delay);
        self
    }

    /// 재시작 호출이 실패하도록 설정합니다.
    pub fn with_failing_restarts(mut self) -> Self {
        self.fail_restarts = true;
        self
    }

    /// ping이 실패하도록 설정합니다.
    pub fn with_failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    /// 기록된 조회 호출의 라벨 필터 목록
    pub fn list_calls(&self) -> Vec<LabelFilter> {
        self.list_calls.lock().unwrap().clone()
    }

    /// 기록된 재시작 대상 ID 목록
    pub fn restarts(&self) -> Vec<String> {
        self.restarts
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// 기록된 재시작 호출 (ID, grace period)
    pub fn restart_calls(&self) -> Vec<(String, Duration)> {
        self.restarts.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl RuntimeClient for MockRuntimeClient {
    async fn list_unhealthy(
        &self,
        filter: &LabelFilter,
    ) -> Result<Vec<ContainerRef>, WatchdogError> {
        self.list_calls.lock().unwrap().push(filter.clone());
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.list_script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(containers)) => Ok(containers),
            Some(Err(reason)) => Err(WatchdogError::Query(reason)),
            None => Ok(self.containers.clone()),
        }
    }

    async fn restart_container(&self, id: &str, timeout: Duration) -> Result<(), WatchdogError> {
        self.restarts
            .lock()
            .unwrap()
            .push((id.to_owned(), timeout));
        if let Some(delay) = self.restart_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_restarts {
            return Err(WatchdogError::Restart {
                container_id: id.to_owned(),
                reason: "mock failure".to_owned(),
            });
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), WatchdogError> {
        if self.fail_ping {
            return Err(WatchdogError::Connection("mock ping failure".to_owned()));
        }
        Ok(())
    }
}
