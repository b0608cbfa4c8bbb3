//! 애플리케이션 배포 드라이버
//!
//! 아티팩트 파일을 tar 아카이브로 감싸 세션 컨테이너의 배포 디렉토리에
//! 업로드하고, 애플리케이션의 준비 경로가 HTTP 성공을 반환할 때까지
//! 폴링합니다. 세션 내 배포는 순차적입니다 — 관리 런타임의 핫 디플로이
//! 스캐너가 동시 배포를 안정적으로 처리하지 못하기 때문입니다.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tracegrid_core::error::SessionError;
use tracegrid_core::metrics::{DEPLOYMENTS_TOTAL, LABEL_VARIANT};
use tracegrid_core::poll::{PollOutcome, poll_until};
use tracegrid_core::types::{DeploymentRecord, DeploymentState, TestApplication};

use crate::platform::ContainerPlatform;
use crate::session::RuntimeSession;

/// 아티팩트 업로드와 배포 완료 확인을 담당하는 드라이버
pub struct DeployDriver<P: ContainerPlatform> {
    platform: std::sync::Arc<P>,
    http: reqwest::Client,
    orchestrator: tracegrid_core::config::OrchestratorConfig,
}

impl<P: ContainerPlatform> DeployDriver<P> {
    pub fn new(
        platform: std::sync::Arc<P>,
        orchestrator: tracegrid_core::config::OrchestratorConfig,
    ) -> Self {
        Self {
            platform,
            http: reqwest::Client::new(),
            orchestrator,
        }
    }

    /// 아티팩트 파일 하나를 담은 tar 아카이브를 만듭니다.
    ///
    /// 플랫폼 아카이브 업로드 API는 tar 형식만 받습니다.
    fn build_archive(file_name: &str, bytes: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, file_name, bytes)
            .and_then(|()| builder.into_inner())
            .map_err(|e| SessionError::ArtifactMissing {
                application: file_name.to_owned(),
                reason: format!("archive build failed: {e}"),
            })
    }

    /// 애플리케이션을 세션에 배포하고 준비될 때까지 대기합니다.
    ///
    /// 타임아웃 시 컨테이너 생존 여부로 실패 수준을 구분합니다:
    /// 컨테이너가 죽었으면 세션 수준의 `Unreachable`, 살아 있으면 해당
    /// 케이스만 실패시키는 `DeployTimeout`입니다.
    pub async fn deploy(
        &self,
        session: &RuntimeSession,
        application: &TestApplication,
        artifact_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<DeploymentRecord, SessionError> {
        let bytes = tokio::fs::read(artifact_path).await.map_err(|e| {
            SessionError::ArtifactMissing {
                application: application.id.clone(),
                reason: format!("read {}: {e}", artifact_path.display()),
            }
        })?;
        let file_name = artifact_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SessionError::ArtifactMissing {
                application: application.id.clone(),
                reason: format!("unusable artifact file name: {}", artifact_path.display()),
            })?;

        let archive = Self::build_archive(file_name, &bytes)?;
        debug!(
            application = %application.id,
            variant = %session.variant_id,
            archive_bytes = archive.len(),
            dest = %session.deployment_path,
            "uploading artifact"
        );
        self.platform
            .upload_archive(&session.container_id, &session.deployment_path, archive)
            .await?;

        let ready_url = format!("{}{}", session.base_url, application.readiness_path());
        let timeout = Duration::from_secs(self.orchestrator.deploy_timeout_secs);
        let policy = self.orchestrator.backoff_policy();
        let outcome = poll_until(&policy, timeout, cancel, || {
            let request = self.http.get(&ready_url);
            async move {
                match request.send().await {
                    Ok(response) if response.status().is_success() => Some(()),
                    _ => None,
                }
            }
        })
        .await;

        match outcome {
            PollOutcome::Ready(()) => {}
            PollOutcome::Cancelled => return Err(SessionError::Cancelled),
            PollOutcome::TimedOut => {
                // 컨테이너가 죽었으면 남은 케이스도 의미가 없다
                let alive = self
                    .platform
                    .is_running(&session.container_id)
                    .await
                    .unwrap_or(false);
                if !alive {
                    return Err(SessionError::Unreachable {
                        variant: session.variant_id.clone(),
                        reason: format!(
                            "container exited during deployment of '{}'",
                            application.id
                        ),
                    });
                }
                return Err(SessionError::DeployTimeout {
                    application: application.id.clone(),
                    waited_secs: self.orchestrator.deploy_timeout_secs,
                });
            }
        }

        metrics::counter!(DEPLOYMENTS_TOTAL, LABEL_VARIANT => session.variant_id.clone())
            .increment(1);
        info!(
            application = %application.id,
            variant = %session.variant_id,
            url = %ready_url,
            "application deployed"
        );

        Ok(DeploymentRecord {
            session_id: session.id,
            application_id: application.id.clone(),
            state: DeploymentState::Deployed,
            completed_at: Some(SystemTime::now()),
        })
    }
}
