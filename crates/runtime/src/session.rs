//! 컨테이너 세션 수명 주기 관리
//!
//! 변형 하나당 하나의 컨테이너 세션을 기동하고, 준비 프로브가 성공할
//! 때까지 대기한 뒤, 종료 시 컨테이너를 확실히 제거합니다.
//!
//! # 수명 주기
//!
//! ```text
//! start(variant)
//!   ├─ 컨테이너 생성 + 시작 (에이전트 환경변수 주입)
//!   ├─ 호스트 포트 조회 (임시 포트 바인딩)
//!   ├─ TCP 준비 프로브 (백오프 폴링, 기동 타임아웃 상한)
//!   └─ RuntimeSession 반환
//! stop(session)
//!   └─ 컨테이너 제거 (멱등, 실패해도 에러를 전파하지 않음)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tracegrid_core::config::{AgentConfig, OrchestratorConfig};
use tracegrid_core::error::{PlatformError, SessionError};
use tracegrid_core::metrics::{
    LABEL_VARIANT, SESSIONS_LIVE, SESSIONS_STARTED_TOTAL, SESSIONS_TORN_DOWN_TOTAL,
};
use tracegrid_core::poll::{PollOutcome, poll_until};
use tracegrid_core::types::ServerVariant;

use crate::platform::{ContainerPlatform, ContainerSpec};

/// 준비 실패 시 캡처할 로그 꼬리 줄 수
const DIAGNOSTIC_LOG_LINES: usize = 200;

/// 기동되어 준비 완료된 컨테이너 세션
///
/// 세션은 변형당 하나이며, 배포 드라이버와 연습 엔진이 `base_url`을 통해
/// 접근합니다.
#[derive(Debug)]
pub struct RuntimeSession {
    /// 세션 식별자 (배포 기록의 상관 키)
    pub id: Uuid,
    /// 기동된 변형 id
    pub variant_id: String,
    /// 플랫폼 컨테이너 id
    pub container_id: String,
    /// 호스트에서 접근 가능한 기준 URL (예: "http://127.0.0.1:49153")
    pub base_url: String,
    /// 컨테이너 내부 배포 디렉토리
    pub deployment_path: String,
    stopped: bool,
}

impl RuntimeSession {
    /// 세션이 이미 종료되었는지 여부
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// 세션 기동과 종료를 담당하는 관리자
pub struct SessionManager<P: ContainerPlatform> {
    platform: Arc<P>,
    orchestrator: OrchestratorConfig,
    agent: AgentConfig,
}

impl<P: ContainerPlatform> SessionManager<P> {
    pub fn new(platform: Arc<P>, orchestrator: OrchestratorConfig, agent: AgentConfig) -> Self {
        Self {
            platform,
            orchestrator,
            agent,
        }
    }

    /// 변형에 주입할 에이전트 환경변수 값을 조립합니다.
    ///
    /// 환경변수 채널을 덮어쓰므로, 변형이 선언한 추가 프로퍼티를 에이전트
    /// 인자 뒤에 재주입합니다.
    fn agent_env_value(&self, variant: &ServerVariant) -> String {
        let mut value = self.agent.attach_args.clone();
        for (key, val) in &variant.extra_properties {
            value.push_str(&format!(" -D{key}={val}"));
        }
        value
    }

    /// 변형의 컨테이너를 기동하고 준비될 때까지 대기합니다.
    ///
    /// 준비 타임아웃 시 컨테이너 로그 꼬리를 진단으로 캡처한 뒤 컨테이너를
    /// 제거하고 `ReadinessTimeout`을 반환합니다. 취소 시에도 이미 생성된
    /// 컨테이너는 제거됩니다.
    pub async fn start(
        &self,
        variant: &ServerVariant,
        cancel: &CancellationToken,
    ) -> Result<RuntimeSession, SessionError> {
        let session_id = Uuid::new_v4();
        let spec = ContainerSpec {
            name: format!("tracegrid-{}-{}", variant.id, &session_id.simple().to_string()[..8]),
            image: variant.image.clone(),
            env: vec![format!(
                "{}={}",
                variant.jvm_env_variable,
                self.agent_env_value(variant)
            )],
            http_port: variant.http_port,
        };

        info!(variant = %variant.id, image = %variant.image, "starting session");

        let container_id =
            self.platform
                .create_container(&spec)
                .await
                .map_err(|e| SessionError::StartFailed {
                    variant: variant.id.clone(),
                    reason: format!("create: {e}"),
                })?;

        if let Err(e) = self.platform.start_container(&container_id).await {
            self.discard_container(&container_id).await;
            return Err(SessionError::StartFailed {
                variant: variant.id.clone(),
                reason: format!("start: {e}"),
            });
        }

        let port = match self.platform.host_port(&container_id, variant.http_port).await {
            Ok(port) => port,
            Err(e) => {
                self.discard_container(&container_id).await;
                return Err(SessionError::StartFailed {
                    variant: variant.id.clone(),
                    reason: format!("port mapping: {e}"),
                });
            }
        };
        let base_url = format!("http://127.0.0.1:{port}");

        let timeout = Duration::from_secs(self.orchestrator.startup_timeout_secs);
        let policy = self.orchestrator.backoff_policy();
        let outcome = poll_until(&policy, timeout, cancel, || async move {
            TcpStream::connect(("127.0.0.1", port)).await.ok().map(|_| ())
        })
        .await;

        match outcome {
            PollOutcome::Ready(()) => {}
            PollOutcome::TimedOut => {
                let diagnostics = self.capture_diagnostics(&container_id).await;
                self.discard_container(&container_id).await;
                return Err(SessionError::ReadinessTimeout {
                    variant: variant.id.clone(),
                    waited_secs: self.orchestrator.startup_timeout_secs,
                    diagnostics,
                });
            }
            PollOutcome::Cancelled => {
                self.discard_container(&container_id).await;
                return Err(SessionError::Cancelled);
            }
        }

        metrics::counter!(SESSIONS_STARTED_TOTAL, LABEL_VARIANT => variant.id.clone())
            .increment(1);
        metrics::gauge!(SESSIONS_LIVE).increment(1.0);
        info!(variant = %variant.id, container_id = %container_id, %base_url, "session ready");

        Ok(RuntimeSession {
            id: session_id,
            variant_id: variant.id.clone(),
            container_id,
            base_url,
            deployment_path: variant.deployment_path.clone(),
            stopped: false,
        })
    }

    /// 세션을 종료하고 컨테이너를 제거합니다.
    ///
    /// 멱등합니다: 이미 종료된 세션이나 이미 사라진 컨테이너는 조용히
    /// 넘어가며, 제거 실패는 경고 로그만 남깁니다. 정리 단계에서 에러를
    /// 전파하면 남은 정리가 막히기 때문입니다.
    pub async fn stop(&self, session: &mut RuntimeSession) {
        if session.stopped {
            debug!(variant = %session.variant_id, "session already stopped");
            return;
        }
        session.stopped = true;
        // 세션이 기동될 때 올라간 게이지는 제거 성공 여부와 무관하게
        // 종료 시 정확히 한 번 내려간다
        metrics::gauge!(SESSIONS_LIVE).decrement(1.0);

        match self.platform.remove_container(&session.container_id).await {
            Ok(()) | Err(PlatformError::ContainerNotFound(_)) => {
                metrics::counter!(
                    SESSIONS_TORN_DOWN_TOTAL,
                    LABEL_VARIANT => session.variant_id.clone()
                )
                .increment(1);
                info!(variant = %session.variant_id, container_id = %session.container_id, "session torn down");
            }
            Err(e) => {
                warn!(
                    variant = %session.variant_id,
                    container_id = %session.container_id,
                    error = %e,
                    "failed to remove session container"
                );
            }
        }
    }

    /// 진단용 로그 꼬리를 최선 노력으로 캡처합니다.
    async fn capture_diagnostics(&self, container_id: &str) -> String {
        match self.platform.tail_logs(container_id, DIAGNOSTIC_LOG_LINES).await {
            Ok(logs) => logs,
            Err(e) => format!("<log capture failed: {e}>"),
        }
    }

    /// 기동 도중 실패한 컨테이너를 제거합니다 (에러 무시).
    async fn discard_container(&self, container_id: &str) {
        if let Err(e) = self.platform.remove_container(container_id).await {
            warn!(container_id, error = %e, "failed to discard container after startup failure");
        }
    }
}

/// 세션 종료를 보증하는 소유 가드
///
/// 워커가 일찍 반환하거나 패닉으로 풀리더라도 컨테이너가 남지 않도록,
/// `stop` 없이 드롭되면 컨테이너 제거를 런타임에 예약합니다. 정상 경로는
/// `stop`을 호출해 동기적으로 정리합니다.
pub struct SessionGuard<P: ContainerPlatform> {
    manager: Arc<SessionManager<P>>,
    session: RuntimeSession,
}

impl<P: ContainerPlatform> SessionGuard<P> {
    pub fn new(manager: Arc<SessionManager<P>>, session: RuntimeSession) -> Self {
        Self { manager, session }
    }

    pub fn session(&self) -> &RuntimeSession {
        &self.session
    }

    /// 세션을 종료합니다 (멱등).
    pub async fn stop(&mut self) {
        let Self { manager, session } = self;
        manager.stop(session).await;
    }
}

impl<P: ContainerPlatform> Drop for SessionGuard<P> {
    fn drop(&mut self) {
        if self.session.stopped {
            return;
        }
        self.session.stopped = true;
        warn!(
            variant = %self.session.variant_id,
            container_id = %self.session.container_id,
            "session dropped without stop; scheduling container removal"
        );
        metrics::gauge!(SESSIONS_LIVE).decrement(1.0);

        let platform = self.manager.platform.clone();
        let variant_id = self.session.variant_id.clone();
        let container_id = self.session.container_id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                match platform.remove_container(&container_id).await {
                    Ok(()) | Err(PlatformError::ContainerNotFound(_)) => {
                        metrics::counter!(
                            SESSIONS_TORN_DOWN_TOTAL,
                            LABEL_VARIANT => variant_id
                        )
                        .increment(1);
                        info!(container_id = %container_id, "session torn down after drop");
                    }
                    Err(e) => {
                        warn!(container_id = %container_id, error = %e, "deferred container removal failed");
                    }
                }
            });
        } else {
            warn!(
                container_id = %container_id,
                "no async runtime available; container left for external cleanup"
            );
        }
    }
}
