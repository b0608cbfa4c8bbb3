//! 결과 집계와 보고서
//!
//! 케이스당 정확히 하나의 결과를 보장합니다. 같은 케이스가 두 번 기록되면
//! 경고를 남기고 첫 결과를 유지합니다 — 중복은 러너의 버그이지 케이스의
//! 실패가 아니기 때문입니다.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::warn;

use tracegrid_core::metrics::{CASES_TOTAL, LABEL_OUTCOME, LABEL_VARIANT};
use tracegrid_core::types::{CaseResult, TestCase};

/// 케이스 결과를 스레드 안전하게 모으는 집계기
#[derive(Default)]
pub struct ResultAggregator {
    cases: Mutex<BTreeMap<String, (TestCase, CaseResult)>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 케이스 결과를 기록합니다 (중복은 첫 결과 유지).
    pub fn record(&self, case: &TestCase, result: CaseResult) {
        let mut cases = self.cases.lock().unwrap_or_else(|e| e.into_inner());
        let label = case.label();
        if cases.contains_key(&label) {
            warn!(case = %label, discarded = %result.kind_name(), "duplicate case result discarded");
            return;
        }
        metrics::counter!(
            CASES_TOTAL,
            LABEL_OUTCOME => result.kind_name(),
            LABEL_VARIANT => case.variant_id.clone()
        )
        .increment(1);
        cases.insert(label, (case.clone(), result));
    }

    /// 해당 케이스의 결과가 이미 기록되었는지 여부
    pub fn has_result(&self, case: &TestCase) -> bool {
        self.cases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&case.label())
    }

    /// 기록된 결과 수
    pub fn len(&self) -> usize {
        self.cases.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 현재까지의 결과로 보고서를 만듭니다.
    pub fn report(&self) -> MatrixReport {
        let cases = self.cases.lock().unwrap_or_else(|e| e.into_inner());
        let mut variants: BTreeMap<String, Vec<CaseReport>> = BTreeMap::new();
        let mut totals = Totals::default();

        for (case, result) in cases.values() {
            totals.total += 1;
            match result {
                CaseResult::Pass => totals.pass += 1,
                CaseResult::BehavioralFailure(_) => totals.behavioral_failures += 1,
                CaseResult::InfraFailure(_) => totals.infra_failures += 1,
                CaseResult::Skipped(_) => totals.skipped += 1,
            }
            variants
                .entry(case.variant_id.clone())
                .or_default()
                .push(CaseReport {
                    application_id: case.application_id.clone(),
                    result: result.clone(),
                });
        }

        MatrixReport { variants, totals }
    }
}

/// 변형별로 묶인 최종 보고서
#[derive(Debug, Clone, Serialize)]
pub struct MatrixReport {
    /// 변형 id → 케이스 결과 목록
    pub variants: BTreeMap<String, Vec<CaseReport>>,
    pub totals: Totals,
}

impl MatrixReport {
    /// 모든 케이스가 통과했는지 여부 (빈 보고서는 통과로 봅니다)
    pub fn is_success(&self) -> bool {
        self.totals.behavioral_failures == 0
            && self.totals.infra_failures == 0
            && self.totals.skipped == 0
    }
}

/// 케이스 하나의 보고 항목
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub application_id: String,
    #[serde(flatten)]
    pub result: CaseResult,
}

/// 결과 종류별 합계
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Totals {
    pub total: usize,
    pub pass: usize,
    pub behavioral_failures: usize,
    pub infra_failures: usize,
    pub skipped: usize,
}
