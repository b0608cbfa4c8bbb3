//! 단위 테스트 공용 스텁
//!
//! 실제 데몬 없이 세션을 기동할 수 있는 최소 플랫폼 구현과 HTTP 스텁
//! 헬퍼를 제공합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use tracegrid_core::config::{AgentConfig, OrchestratorConfig};
use tracegrid_core::error::PlatformError;
use tracegrid_core::types::ServerVariant;
use tracegrid_runtime::{ContainerPlatform, ContainerSpec, RuntimeSession, SessionManager};

#[derive(Default)]
pub struct StubContainer {
    pub running: bool,
    pub uploads: Vec<String>,
}

/// 컨테이너 상태를 메모리에서 흉내내는 플랫폼
#[derive(Default)]
pub struct StubPlatform {
    pub containers: Mutex<HashMap<String, StubContainer>>,
    pub mapped_port: AtomicU16,
    pub removed: AtomicU32,
    pub fail_ping: std::sync::atomic::AtomicBool,
    next_id: AtomicU32,
}

impl StubPlatform {
    pub fn with_port(port: u16) -> Self {
        let platform = Self::default();
        platform.mapped_port.store(port, Ordering::SeqCst);
        platform
    }

    pub fn removed_count(&self) -> u32 {
        self.removed.load(Ordering::SeqCst)
    }
}

impl ContainerPlatform for StubPlatform {
    async fn create_container(&self, _spec: &ContainerSpec) -> Result<String, PlatformError> {
        let id = format!("{:012x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 0xbeef);
        self.containers
            .lock()
            .await
            .insert(id.clone(), StubContainer::default());
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), PlatformError> {
        self.containers
            .lock()
            .await
            .get_mut(id)
            .map(|c| c.running = true)
            .ok_or_else(|| PlatformError::ContainerNotFound(id.to_owned()))
    }

    async fn host_port(&self, _id: &str, _port: u16) -> Result<u16, PlatformError> {
        Ok(self.mapped_port.load(Ordering::SeqCst))
    }

    async fn upload_archive(
        &self,
        id: &str,
        dest_path: &str,
        _archive: Vec<u8>,
    ) -> Result<(), PlatformError> {
        self.containers
            .lock()
            .await
            .get_mut(id)
            .map(|c| c.uploads.push(dest_path.to_owned()))
            .ok_or_else(|| PlatformError::ContainerNotFound(id.to_owned()))
    }

    async fn tail_logs(&self, _id: &str, _tail: usize) -> Result<String, PlatformError> {
        Ok(String::new())
    }

    async fn is_running(&self, id: &str) -> Result<bool, PlatformError> {
        Ok(self
            .containers
            .lock()
            .await
            .get(id)
            .map(|c| c.running)
            .unwrap_or(false))
    }

    async fn remove_container(&self, id: &str) -> Result<(), PlatformError> {
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
            return Err(PlatformError::Connection("stub daemon offline".to_owned()));
        }
        Ok(())
    }
}

/// 모든 요청에 200을 반환하는 HTTP 스텁을 띄우고 포트를 반환합니다.
pub async fn spawn_ok_server() -> u16 {
    spawn_status_server("200 OK").await
}

/// 모든 요청에 지정한 상태 줄을 반환하는 HTTP 스텁을 띄웁니다.
pub async fn spawn_status_server(status_line: &'static str) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });
    port
}

/// 짧은 타임아웃과 빠른 백오프를 쓰는 테스트용 설정
pub fn fast_orchestrator() -> OrchestratorConfig {
    OrchestratorConfig {
        startup_timeout_secs: 2,
        deploy_timeout_secs: 2,
        telemetry_timeout_secs: 1,
        backoff_initial_ms: 20,
        backoff_max_ms: 50,
        ..Default::default()
    }
}

pub fn test_variant(id: &str) -> ServerVariant {
    ServerVariant {
        id: id.to_owned(),
        image: format!("example/{id}:latest"),
        http_port: 8080,
        deployment_path: "/deployments".to_owned(),
        jvm_env_variable: "JAVA_OPTS".to_owned(),
        extra_properties: Vec::new(),
    }
}

/// 스텁 플랫폼으로 준비 완료된 세션을 만듭니다.
pub async fn ready_session(platform: Arc<StubPlatform>, variant_id: &str) -> RuntimeSession {
    let manager = SessionManager::new(platform, fast_orchestrator(), AgentConfig::default());
    manager
        .start(&test_variant(variant_id), &CancellationToken::new())
        .await
        .unwrap()
}
