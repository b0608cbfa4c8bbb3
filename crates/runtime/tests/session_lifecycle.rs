//! 세션 수명 주기 통합 테스트
//!
//! 공개 API만 사용해 기동 → 배포 → 종료 흐름을 검증합니다.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use tracegrid_core::config::{AgentConfig, OrchestratorConfig};
use tracegrid_core::error::PlatformError;
use tracegrid_core::types::{DeploymentState, ServerVariant, TestApplication};
use tracegrid_runtime::{
    ContainerPlatform, ContainerSpec, DeployDriver, LocalArtifactRegistry, SessionGuard,
    SessionManager,
};
use tracegrid_runtime::registry::ArtifactRegistry;

mod mock {
    use super::*;

    #[derive(Default)]
    pub struct StubContainer {
        pub running: bool,
        pub uploads: Vec<String>,
    }

    /// 실제 데몬 없이 컨테이너 상태를 흉내내는 플랫폼
    #[derive(Default)]
    pub struct StubPlatform {
        pub containers: Mutex<HashMap<String, StubContainer>>,
        pub mapped_port: AtomicU16,
        pub removed: AtomicU32,
        next_id: AtomicU32,
    }

    impl StubPlatform {
        pub fn with_port(port: u16) -> Self {
            let platform = Self::default();
            platform.mapped_port.store(port, Ordering::SeqCst);
            platform
        }
    }

    impl ContainerPlatform for StubPlatform {
        async fn create_container(&self, _spec: &ContainerSpec) -> Result<String, PlatformError> {
            let id = format!("{:012x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 0xf00d);
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
            Ok(())
        }
    }
}

/// 모든 요청에 200을 반환하는 최소 HTTP 스텁
async fn spawn_ok_server() -> u16 {
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
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
            });
        }
    });
    port
}

fn variant() -> ServerVariant {
    ServerVariant {
        id: "tomcat-9".to_owned(),
        image: "tomcat:9-jre11".to_owned(),
        http_port: 8080,
        deployment_path: "/usr/local/tomcat/webapps".to_owned(),
        jvm_env_variable: "CATALINA_OPTS".to_owned(),
        extra_properties: Vec::new(),
    }
}

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        startup_timeout_secs: 2,
        deploy_timeout_secs: 2,
        backoff_initial_ms: 20,
        backoff_max_ms: 50,
        ..Default::default()
    }
}

#[tokio::test]
async fn full_session_roundtrip_start_deploy_stop() {
    let port = spawn_ok_server().await;
    let platform = Arc::new(mock::StubPlatform::with_port(port));

    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("greeter.war"), b"PK\x03\x04")
        .await
        .unwrap();

    let application = TestApplication {
        id: "greeter".to_owned(),
        artifact: "greeter.war".to_owned(),
        context_path: "/greeter".to_owned(),
        ..Default::default()
    };

    let registry = LocalArtifactRegistry::new(dir.path());
    let artifact = registry.resolve(&application).unwrap();
    assert!(artifact.ends_with(Path::new("greeter.war")));

    let manager = SessionManager::new(platform.clone(), fast_config(), AgentConfig::default());
    let driver = DeployDriver::new(platform.clone(), fast_config());
    let cancel = CancellationToken::new();

    let mut session = manager.start(&variant(), &cancel).await.unwrap();
    assert_eq!(session.variant_id, "tomcat-9");

    let record = driver
        .deploy(&session, &application, &artifact, &cancel)
        .await
        .unwrap();
    assert_eq!(record.state, DeploymentState::Deployed);
    assert_eq!(record.session_id, session.id);

    {
        let containers = platform.containers.lock().await;
        assert_eq!(
            containers.get(&session.container_id).unwrap().uploads,
            vec!["/usr/local/tomcat/webapps".to_owned()]
        );
    }

    manager.stop(&mut session).await;
    assert_eq!(platform.removed.load(Ordering::SeqCst), 1);
    assert!(platform.containers.lock().await.is_empty());
}

#[tokio::test]
async fn failed_readiness_leaves_no_container_behind() {
    // 수신자가 없는 포트로 프로브를 실패시킨다
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let platform = Arc::new(mock::StubPlatform::with_port(port));
    let manager = SessionManager::new(
        platform.clone(),
        OrchestratorConfig {
            startup_timeout_secs: 1,
            backoff_initial_ms: 20,
            backoff_max_ms: 50,
            ..Default::default()
        },
        AgentConfig::default(),
    );

    let result = manager.start(&variant(), &CancellationToken::new()).await;
    assert!(result.is_err());
    assert!(platform.containers.lock().await.is_empty());
}

#[tokio::test]
async fn panicking_worker_leaves_no_container_behind() {
    let port = spawn_ok_server().await;
    let platform = Arc::new(mock::StubPlatform::with_port(port));
    let manager = Arc::new(SessionManager::new(
        platform.clone(),
        fast_config(),
        AgentConfig::default(),
    ));

    let worker = tokio::spawn({
        let manager = manager.clone();
        async move {
            let session = manager
                .start(&variant(), &CancellationToken::new())
                .await
                .unwrap();
            let _guard = SessionGuard::new(manager, session);
            panic!("worker blew up mid-case");
        }
    });
    assert!(worker.await.is_err());

    // 가드 드롭이 예약한 제거가 끝날 때까지 대기
    for _ in 0..50 {
        if platform.removed.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(platform.removed.load(Ordering::SeqCst), 1);
    assert!(platform.containers.lock().await.is_empty());
}
