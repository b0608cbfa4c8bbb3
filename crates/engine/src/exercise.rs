//! 케이스 연습과 검증
//!
//! 배포된 애플리케이션에 선언된 요청을 보내고, 상관 id로 격리된 텔레메트리
//! 스냅샷을 수집기에서 폴링한 뒤 기대 셰이프와 비교합니다.
//!
//! 실패 구분이 이 모듈의 핵심입니다:
//! - 요청/수집기 전송 실패, 스냅샷 부재 → `InfraFailure`
//! - 직접 응답 상태가 기대와 다르거나 셰이프 불일치 → `BehavioralFailure`
//! - 취소 → `Skipped`

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use tracegrid_core::config::OrchestratorConfig;
use tracegrid_core::error::VerifyError;
use tracegrid_core::poll::{PollOutcome, poll_until};
use tracegrid_core::types::{
    CaseResult, ExpectedTransaction, RequestSpec, TelemetrySnapshot, TestApplication,
};
use tracegrid_runtime::RuntimeSession;

use crate::shape;
use crate::telemetry::TelemetryCollector;

/// 연습 요청에 찍는 상관 헤더
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// 연습과 검증을 수행하는 엔진
pub struct ExerciseEngine<C: TelemetryCollector> {
    collector: Arc<C>,
    http: reqwest::Client,
    orchestrator: OrchestratorConfig,
}

impl<C: TelemetryCollector> ExerciseEngine<C> {
    pub fn new(collector: Arc<C>, orchestrator: OrchestratorConfig) -> Self {
        Self {
            collector,
            http: reqwest::Client::new(),
            orchestrator,
        }
    }

    /// 케이스 하나를 연습하고 결과를 반환합니다.
    ///
    /// 세션/배포 수준 실패는 호출자가 처리하며, 이 메서드는 도달 가능한
    /// 배포를 전제로 케이스 수준 결과만 만듭니다.
    pub async fn run_case(
        &self,
        session: &RuntimeSession,
        application: &TestApplication,
        cancel: &CancellationToken,
    ) -> CaseResult {
        if cancel.is_cancelled() {
            return CaseResult::Skipped("cancelled before exercise".to_owned());
        }

        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            application = %application.id,
            variant = %session.variant_id,
            correlation_id = %correlation_id,
            "exercising case"
        );

        for request in &application.requests {
            let url = format!("{}{}", session.base_url, request.path);
            let method = match reqwest::Method::from_bytes(request.method.as_bytes()) {
                Ok(method) => method,
                Err(_) => {
                    return CaseResult::InfraFailure(format!(
                        "invalid HTTP method '{}' for {url}",
                        request.method
                    ));
                }
            };
            let sent = self
                .http
                .request(method, &url)
                .header(CORRELATION_HEADER, correlation_id.as_str())
                .send()
                .await;
            match sent {
                Ok(response) => {
                    let status = response.status().as_u16();
                    debug!(url = %url, status, "exercise request sent");
                    if let Some(mismatch) = direct_status_mismatch(application, request, status) {
                        return CaseResult::BehavioralFailure(mismatch);
                    }
                }
                Err(e) => {
                    return CaseResult::InfraFailure(format!("request {url} failed: {e}"));
                }
            }
        }

        match self.await_snapshot(&correlation_id, cancel).await {
            PollOutcome::Ready(Ok(snapshot)) => match shape::compare(&application.expected, &snapshot) {
                Ok(()) => {
                    info!(
                        application = %application.id,
                        variant = %session.variant_id,
                        "case passed"
                    );
                    CaseResult::Pass
                }
                Err(mismatch) => CaseResult::BehavioralFailure(mismatch.to_string()),
            },
            PollOutcome::Ready(Err(e)) => CaseResult::InfraFailure(e.to_string()),
            PollOutcome::TimedOut => CaseResult::InfraFailure(
                VerifyError::SnapshotAbsent {
                    waited_secs: self.orchestrator.telemetry_timeout_secs,
                }
                .to_string(),
            ),
            PollOutcome::Cancelled => {
                CaseResult::Skipped("cancelled while awaiting telemetry".to_owned())
            }
        }
    }

    /// 상관 id의 스냅샷이 나타날 때까지 폴링합니다.
    ///
    /// 수집기 에러는 재시도 대상이 아니라 즉시 단락됩니다 — 에이전트가
    /// 아직 전송하지 않은 것과 수집기가 고장난 것은 다른 문제입니다.
    async fn await_snapshot(
        &self,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> PollOutcome<Result<TelemetrySnapshot, VerifyError>> {
        let timeout = Duration::from_secs(self.orchestrator.telemetry_timeout_secs);
        let policy = self.orchestrator.backoff_policy();
        let collector = self.collector.as_ref();
        poll_until(&policy, timeout, cancel, || async move {
            match collector.fetch_snapshot(correlation_id).await {
                Ok(Some(snapshot)) => Some(Ok(snapshot)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        })
        .await
    }
}

/// 직접 응답 상태를 요청 라벨과 이름이 일치하는 기대 트랜잭션과 대조합니다.
///
/// 애플리케이션이 텔레메트리를 전혀 내보내지 않은 채 에러 상태를 돌려줘도
/// 인프라가 아닌 동작 문제로 잡히도록, 스냅샷을 기다리기 전에 확인합니다.
/// 라벨과 일치하는 기대 트랜잭션이 없으면 판단을 보류합니다.
fn direct_status_mismatch(
    application: &TestApplication,
    request: &RequestSpec,
    status: u16,
) -> Option<String> {
    let label = format!("{} {}", request.method, request.path);
    let expectations: Vec<&ExpectedTransaction> = application
        .expected
        .transactions
        .iter()
        .filter(|t| shape::name_matches(&t.name, &label))
        .collect();
    if expectations.is_empty() || expectations.iter().any(|t| t.status == status) {
        return None;
    }
    Some(format!(
        "request '{label}' returned status {status}, expected {}",
        expectations[0].status
    ))
}
