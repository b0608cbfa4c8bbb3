//! Container platform abstraction for testability.
//!
//! The [`ContainerPlatform`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardPlatform`] while tests use mock
//! implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   ┌──────────────┐
//! │ SessionManager │   │ DeployDriver │
//! └───────┬────────┘   └──────┬───────┘
//!         │                   │
//!         ▼                   ▼
//!       ┌───────────────────────┐
//!       │   ContainerPlatform   │ (trait)
//!       └───────────────────────┘
//!             │           │
//!             ▼           ▼
//!        ┌────────┐   ┌──────┐
//!        │Bollard │   │ Mock │
//!        └───┬────┘   └──────┘
//!            │
//!            ▼
//!       Docker Daemon
//! ```
//!
//! # Container ID Validation
//!
//! All methods that accept container IDs perform validation to prevent
//! injection attacks: IDs must be 1-64 ASCII hex characters.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracegrid_core::error::PlatformError;

/// Specification for a container to create.
///
/// Built by the session manager from a [`ServerVariant`] declaration plus
/// the agent-attachment environment entry.
///
/// [`ServerVariant`]: tracegrid_core::types::ServerVariant
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name (unique per session).
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment entries in `KEY=value` form.
    pub env: Vec<String>,
    /// Container-internal HTTP port to publish on an ephemeral host port.
    pub http_port: u16,
}

/// Validates a container ID to prevent injection attacks.
///
/// Docker container IDs are 64-character hex strings (or shorter prefix
/// forms).
fn validate_container_id(id: &str) -> Result<(), PlatformError> {
    if id.is_empty() || id.len() > 64 {
        return Err(PlatformError::Api(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PlatformError::Api(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// Trait abstracting container platform operations.
///
/// All Docker API calls go through this trait, enabling testability via
/// mocking. The trait is `Send + Sync + 'static`, allowing safe sharing
/// across async contexts.
///
/// # Error Handling
///
/// - **404 errors**: Converted to `PlatformError::ContainerNotFound`
/// - **Connection errors**: Wrapped as `PlatformError::Connection`
/// - **Action failures**: Wrapped as `PlatformError::ActionFailed`
pub trait ContainerPlatform: Send + Sync + 'static {
    /// Creates a container from the given spec and returns its ID.
    ///
    /// The container is created but not started.
    fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> impl Future<Output = Result<String, PlatformError>> + Send;

    /// Starts a previously created container.
    fn start_container(&self, id: &str)
    -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Returns the ephemeral host port mapped to `container_port`.
    ///
    /// Only valid after the container has been started.
    fn host_port(
        &self,
        id: &str,
        container_port: u16,
    ) -> impl Future<Output = Result<u16, PlatformError>> + Send;

    /// Uploads a tar archive into `dest_path` inside the container.
    ///
    /// Used by the deployment driver to place application artifacts into
    /// the variant's deployment directory.
    fn upload_archive(
        &self,
        id: &str,
        dest_path: &str,
        archive: Vec<u8>,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Returns the last `tail` lines of the container's stdout/stderr.
    ///
    /// Captured into `InfraFailure` diagnostics when startup or deployment
    /// fails, so a broken combination can be triaged from the report alone.
    fn tail_logs(
        &self,
        id: &str,
        tail: usize,
    ) -> impl Future<Output = Result<String, PlatformError>> + Send;

    /// Reports whether the container's main process is running.
    fn is_running(&self, id: &str) -> impl Future<Output = Result<bool, PlatformError>> + Send;

    /// Stops (grace period) and removes the container.
    ///
    /// Removal of an already-removed container returns
    /// `PlatformError::ContainerNotFound`; callers treat that as success
    /// to keep teardown idempotent.
    fn remove_container(&self, id: &str)
    -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Checks platform daemon connectivity.
    ///
    /// Used as a run precondition: an unreachable daemon aborts the whole
    /// matrix before any session is started.
    fn ping(&self) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

/// Production platform implementation using `bollard`.
///
/// Communicates with the Docker daemon via a Unix socket.
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async
/// tasks.
pub struct BollardPlatform {
    docker: Arc<bollard::Docker>,
}

impl BollardPlatform {
    /// Connects to Docker using the default local socket.
    pub fn connect_local() -> Result<Self, PlatformError> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| PlatformError::Connection(format!("failed to connect to docker: {e}")))?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, PlatformError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    PlatformError::Connection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

impl ContainerPlatform for BollardPlatform {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, PlatformError> {
        use bollard::container::{Config, CreateContainerOptions};
        use bollard::models::{HostConfig, PortBinding};

        let port_key = format!("{}/tcp", spec.http_port);

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(port_key.clone(), HashMap::new());

        // Empty host port requests an ephemeral port from the daemon.
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            port_key,
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_owned()),
                host_port: Some(String::new()),
            }]),
        );

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| PlatformError::Api(format!("create container failed: {e}")))?;

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), PlatformError> {
        validate_container_id(id)?;

        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(|e| PlatformError::ActionFailed {
                container_id: id.to_owned(),
                reason: format!("start failed: {e}"),
            })
    }

    async fn host_port(&self, id: &str, container_port: u16) -> Result<u16, PlatformError> {
        validate_container_id(id)?;

        let details = self.docker.inspect_container(id, None).await.map_err(|e| {
            if e.to_string().contains("404") {
                PlatformError::ContainerNotFound(id.to_owned())
            } else {
                PlatformError::Api(format!("inspect container failed: {e}"))
            }
        })?;

        let port_key = format!("{container_port}/tcp");
        details
            .network_settings
            .and_then(|net| net.ports)
            .and_then(|ports| ports.get(&port_key).cloned().flatten())
            .and_then(|bindings| bindings.into_iter().next())
            .and_then(|binding| binding.host_port)
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(|| {
                PlatformError::Api(format!(
                    "no host binding for port {container_port} on container {id}"
                ))
            })
    }

    async fn upload_archive(
        &self,
        id: &str,
        dest_path: &str,
        archive: Vec<u8>,
    ) -> Result<(), PlatformError> {
        validate_container_id(id)?;

        use bollard::container::UploadToContainerOptions;

        let options = UploadToContainerOptions {
            path: dest_path.to_owned(),
            ..Default::default()
        };

        self.docker
            .upload_to_container(id, Some(options), archive.into())
            .await
            .map_err(|e| PlatformError::ActionFailed {
                container_id: id.to_owned(),
                reason: format!("archive upload to '{dest_path}' failed: {e}"),
            })
    }

    async fn tail_logs(&self, id: &str, tail: usize) -> Result<String, PlatformError> {
        validate_container_id(id)?;

        use bollard::container::LogsOptions;
        use futures::StreamExt;

        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(log) => output.push_str(&String::from_utf8_lossy(&log.into_bytes())),
                Err(e) => {
                    return Err(PlatformError::Api(format!("log fetch failed: {e}")));
                }
            }
        }
        Ok(output)
    }

    async fn is_running(&self, id: &str) -> Result<bool, PlatformError> {
        validate_container_id(id)?;

        let details = self.docker.inspect_container(id, None).await.map_err(|e| {
            if e.to_string().contains("404") {
                PlatformError::ContainerNotFound(id.to_owned())
            } else {
                PlatformError::Api(format!("inspect container failed: {e}"))
            }
        })?;

        Ok(details
            .state
            .and_then(|state| state.running)
            .unwrap_or(false))
    }

    async fn remove_container(&self, id: &str) -> Result<(), PlatformError> {
        validate_container_id(id)?;

        use bollard::container::{RemoveContainerOptions, StopContainerOptions};

        // Grace-period stop first; force removal covers a hung process.
        if let Err(e) = self
            .docker
            .stop_container(id, Some(StopContainerOptions { t: 10 }))
            .await
        {
            if e.to_string().contains("404") {
                return Err(PlatformError::ContainerNotFound(id.to_owned()));
            }
            tracing::debug!(container_id = id, error = %e, "stop before remove failed");
        }

        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| {
                if e.to_string().contains("404") {
                    PlatformError::ContainerNotFound(id.to_owned())
                } else {
                    PlatformError::ActionFailed {
                        container_id: id.to_owned(),
                        reason: format!("remove failed: {e}"),
                    }
                }
            })
    }

    async fn ping(&self) -> Result<(), PlatformError> {
        self.docker
            .ping()
            .await
            .map_err(|e| PlatformError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// 테스트용 Mock 플랫폼
///
/// 설정 가능한 응답을 반환하여 Docker 없이도 테스트할 수 있습니다.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    #[derive(Debug, Default, Clone)]
    pub struct MockContainer {
        pub name: String,
        pub image: String,
        pub env: Vec<String>,
        pub running: bool,
        pub uploads: Vec<(String, usize)>,
    }

    /// 메서드 호출을 기록하고 설정된 응답을 돌려주는 mock 플랫폼
    #[derive(Default)]
    pub struct MockPlatform {
        pub containers: Mutex<HashMap<String, MockContainer>>,
        /// host_port가 반환할 포트 (0이면 에러)
        pub mapped_port: AtomicU32,
        pub fail_create: std::sync::atomic::AtomicBool,
        pub fail_ping: std::sync::atomic::AtomicBool,
        pub fail_remove: std::sync::atomic::AtomicBool,
        pub removed: AtomicU32,
        next_id: AtomicU32,
        pub log_output: Mutex<String>,
    }

    impl MockPlatform {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_mapped_port(self, port: u16) -> Self {
            self.mapped_port.store(u32::from(port), Ordering::SeqCst);
            self
        }

        pub async fn set_logs(&self, logs: &str) {
            *self.log_output.lock().await = logs.to_owned();
        }

        pub fn removed_count(&self) -> u32 {
            self.removed.load(Ordering::SeqCst)
        }
    }

    impl ContainerPlatform for MockPlatform {
        async fn create_container(&self, spec: &ContainerSpec) -> Result<String, PlatformError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(PlatformError::Api("mock create failure".to_owned()));
            }
            let id = format!("{:012x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 0xabc);
            self.containers.lock().await.insert(
                id.clone(),
                MockContainer {
                    name: spec.name.clone(),
                    image: spec.image.clone(),
                    env: spec.env.clone(),
                    running: false,
                    uploads: Vec::new(),
                },
            );
            Ok(id)
        }

        async fn start_container(&self, id: &str) -> Result<(), PlatformError> {
            validate_container_id(id)?;
            let mut containers = self.containers.lock().await;
            match containers.get_mut(id) {
                Some(container) => {
                    container.running = true;
                    Ok(())
                }
                None => Err(PlatformError::ContainerNotFound(id.to_owned())),
            }
        }

        async fn host_port(&self, id: &str, _container_port: u16) -> Result<u16, PlatformError> {
            validate_container_id(id)?;
            let port = self.mapped_port.load(Ordering::SeqCst);
            if port == 0 {
                return Err(PlatformError::Api("no port mapping".to_owned()));
            }
            Ok(u16::try_from(port).unwrap_or(0))
        }

        async fn upload_archive(
            &self,
            id: &str,
            dest_path: &str,
            archive: Vec<u8>,
        ) -> Result<(), PlatformError> {
            validate_container_id(id)?;
            let mut containers = self.containers.lock().await;
            match containers.get_mut(id) {
                Some(container) => {
                    container.uploads.push((dest_path.to_owned(), archive.len()));
                    Ok(())
                }
                None => Err(PlatformError::ContainerNotFound(id.to_owned())),
            }
        }

        async fn tail_logs(&self, id: &str, _tail: usize) -> Result<String, PlatformError> {
            validate_container_id(id)?;
            Ok(self.log_output.lock().await.clone())
        }

        async fn is_running(&self, id: &str) -> Result<bool, PlatformError> {
            validate_container_id(id)?;
            self.containers
                .lock()
                .await
                .get(id)
                .map(|c| c.running)
                .ok_or_else(|| PlatformError::ContainerNotFound(id.to_owned()))
        }

        async fn remove_container(&self, id: &str) -> Result<(), PlatformError> {
            validate_container_id(id)?;
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err(PlatformError::Api("mock remove failure".to_owned()));
            }
            match self.containers.lock().await.remove(id) {
                Some(_) => {
                    self.removed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                None => Err(PlatformError::ContainerNotFound(id.to_owned())),
            }
        }

        async fn ping(&self) -> Result<(), PlatformError> {
            if self.fail_ping.load(Ordering::SeqCst) {
                return Err(PlatformError::Connection("mock ping failure".to_owned()));
            }
            Ok(())
        }
    }
}
