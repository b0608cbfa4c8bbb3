//! 매트릭스 러너
//!
//! 전개된 계획을 실행합니다. 변형 묶음마다 워커 태스크 하나가 세션을
//! 기동해 묶음의 케이스를 순차 처리하고, 세마포어가 동시 세션 수를
//! 제한합니다. 세션 정리는 워커의 마지막 단계로 항상 수행됩니다.
//!
//! # 실패 정책
//!
//! - 전제조건(플랫폼/수집기/아티팩트) 실패 → 실행 자체를 시작하지 않음
//! - 세션 기동 실패 → 묶음 전체를 `InfraFailure`로 기록
//! - 케이스 도중 세션 치명 실패 → 해당 케이스는 `InfraFailure`,
//!   남은 케이스는 `Skipped`
//! - 취소 → 진행 중 케이스부터 `Skipped`, 정리는 그대로 수행

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tracegrid_core::config::{AgentConfig, OrchestratorConfig};
use tracegrid_core::error::{SessionError, TracegridError};
use tracegrid_core::types::{CaseResult, TestCase};
use tracegrid_runtime::{
    ArtifactRegistry, ContainerPlatform, DeployDriver, SessionGuard, SessionManager,
};

use crate::exercise::ExerciseEngine;
use crate::matrix::{MatrixPlan, VariantGroup};
use crate::report::{MatrixReport, ResultAggregator};
use crate::telemetry::TelemetryCollector;

/// 계획 전체를 실행하는 러너
pub struct MatrixRunner<P, C, R>
where
    P: ContainerPlatform,
    C: TelemetryCollector,
    R: ArtifactRegistry,
{
    platform: Arc<P>,
    collector: Arc<C>,
    registry: Arc<R>,
    sessions: Arc<SessionManager<P>>,
    deployer: Arc<DeployDriver<P>>,
    exerciser: Arc<ExerciseEngine<C>>,
    orchestrator: OrchestratorConfig,
}

impl<P, C, R> MatrixRunner<P, C, R>
where
    P: ContainerPlatform,
    C: TelemetryCollector,
    R: ArtifactRegistry,
{
    pub fn new(
        platform: Arc<P>,
        collector: Arc<C>,
        registry: Arc<R>,
        orchestrator: OrchestratorConfig,
        agent: AgentConfig,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            platform.clone(),
            orchestrator.clone(),
            agent,
        ));
        let deployer = Arc::new(DeployDriver::new(platform.clone(), orchestrator.clone()));
        let exerciser = Arc::new(ExerciseEngine::new(collector.clone(), orchestrator.clone()));
        Self {
            platform,
            collector,
            registry,
            sessions,
            deployer,
            exerciser,
            orchestrator,
        }
    }

    /// 실행 전제조건을 점검합니다.
    ///
    /// 플랫폼 데몬과 수집기가 응답하지 않거나 계획의 아티팩트가 하나라도
    /// 없으면, 케이스 결과 대신 실행 전체를 중단합니다 — 모든 케이스가
    /// 같은 이유로 실패할 것이 자명하기 때문입니다.
    async fn check_preconditions(&self, plan: &MatrixPlan) -> Result<(), TracegridError> {
        self.platform
            .ping()
            .await
            .map_err(|e| TracegridError::Precondition(format!("container platform: {e}")))?;
        self.collector
            .ping()
            .await
            .map_err(|e| TracegridError::Precondition(format!("telemetry collector: {e}")))?;

        for group in &plan.groups {
            for application in &group.applications {
                self.registry
                    .resolve(application)
                    .map_err(|e| TracegridError::Precondition(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// 계획을 실행하고 보고서를 반환합니다.
    pub async fn run(
        &self,
        plan: MatrixPlan,
        cancel: &CancellationToken,
    ) -> Result<MatrixReport, TracegridError> {
        self.check_preconditions(&plan).await?;

        let all_cases: Vec<TestCase> = plan.groups.iter().flat_map(|g| g.cases()).collect();
        info!(
            cases = all_cases.len(),
            sessions = plan.groups.len(),
            max_concurrent = self.orchestrator.max_concurrent_sessions,
            "matrix run starting"
        );

        let aggregator = Arc::new(ResultAggregator::new());
        let semaphore = Arc::new(Semaphore::new(self.orchestrator.max_concurrent_sessions));

        let mut handles = Vec::with_capacity(plan.groups.len());
        for group in plan.groups {
            let sessions = self.sessions.clone();
            let deployer = self.deployer.clone();
            let exerciser = self.exerciser.clone();
            let registry = self.registry.clone();
            let aggregator = aggregator.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                run_group(
                    group, sessions, deployer, exerciser, registry, aggregator, semaphore, cancel,
                )
                .await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "variant worker task failed");
            }
        }

        // 케이스당 정확히 하나의 결과: 워커가 죽어 누락된 케이스를 보정한다
        for case in &all_cases {
            if !aggregator.has_result(case) {
                warn!(case = %case, "no result recorded; marking skipped");
                aggregator.record(case, CaseResult::Skipped("no result recorded".to_owned()));
            }
        }

        let report = aggregator.report();
        info!(
            total = report.totals.total,
            pass = report.totals.pass,
            behavioral = report.totals.behavioral_failures,
            infra = report.totals.infra_failures,
            skipped = report.totals.skipped,
            "matrix run finished"
        );
        Ok(report)
    }
}

/// 변형 묶음 하나를 처리하는 워커 본체
#[allow(clippy::too_many_arguments)]
async fn run_group<P, C, R>(
    group: VariantGroup,
    sessions: Arc<SessionManager<P>>,
    deployer: Arc<DeployDriver<P>>,
    exerciser: Arc<ExerciseEngine<C>>,
    registry: Arc<R>,
    aggregator: Arc<ResultAggregator>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) where
    P: ContainerPlatform,
    C: TelemetryCollector,
    R: ArtifactRegistry,
{
    let record_all = |reason: fn(&str) -> CaseResult, detail: &str| {
        for case in group.cases() {
            aggregator.record(&case, reason(detail));
        }
    };

    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            record_all(|d| CaseResult::Skipped(d.to_owned()), "runner shut down");
            return;
        }
    };

    if cancel.is_cancelled() {
        record_all(
            |d| CaseResult::Skipped(d.to_owned()),
            "cancelled before session start",
        );
        return;
    }

    let session = match sessions.start(&group.variant, &cancel).await {
        Ok(session) => session,
        Err(SessionError::Cancelled) => {
            record_all(
                |d| CaseResult::Skipped(d.to_owned()),
                "cancelled during session start",
            );
            return;
        }
        Err(e) => {
            warn!(variant = %group.variant.id, error = %e, "session start failed");
            record_all(|d| CaseResult::InfraFailure(d.to_owned()), &e.to_string());
            return;
        }
    };
    // 가드가 세션을 소유하므로 워커가 어떤 경로로 풀려도 컨테이너는 정리된다
    let mut session = SessionGuard::new(sessions, session);

    let mut session_fatal: Option<String> = None;
    for application in &group.applications {
        let case = TestCase::new(&group.variant.id, &application.id);

        if let Some(reason) = &session_fatal {
            aggregator.record(&case, CaseResult::Skipped(reason.clone()));
            continue;
        }
        if cancel.is_cancelled() {
            aggregator.record(&case, CaseResult::Skipped("cancelled".to_owned()));
            continue;
        }

        // 전제조건에서 확인했지만 실행 사이에 지워졌을 수 있다
        let artifact = match registry.resolve(application) {
            Ok(path) => path,
            Err(e) => {
                aggregator.record(&case, CaseResult::InfraFailure(e.to_string()));
                continue;
            }
        };

        match deployer
            .deploy(session.session(), application, &artifact, &cancel)
            .await
        {
            Ok(_) => {
                let result = exerciser
                    .run_case(session.session(), application, &cancel)
                    .await;
                aggregator.record(&case, result);
            }
            Err(SessionError::Cancelled) => {
                aggregator.record(&case, CaseResult::Skipped("cancelled".to_owned()));
            }
            Err(e) if e.is_session_fatal() => {
                warn!(case = %case, error = %e, "session became unusable");
                aggregator.record(&case, CaseResult::InfraFailure(e.to_string()));
                session_fatal = Some(format!(
                    "session for variant '{}' failed before this case",
                    group.variant.id
                ));
            }
            Err(e) => {
                aggregator.record(&case, CaseResult::InfraFailure(e.to_string()));
            }
        }
    }

    session.stop().await;
}
