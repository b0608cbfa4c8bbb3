//! 매트릭스 계획 전개
//!
//! 변형 × 애플리케이션 선언을 실행 계획으로 전개합니다. 전개는 결정적이며
//! 선언 순서를 보존합니다. 제외 목록에 걸린 조합은 계획에 포함되지 않고,
//! 실행 가능한 애플리케이션이 하나도 없는 변형은 세션 자체를 건너뜁니다.

use tracegrid_core::types::{ServerVariant, TestApplication, TestCase};
use tracing::debug;

/// 한 변형에서 실행할 애플리케이션 묶음
///
/// 세션 하나가 이 묶음 전체를 담당합니다.
#[derive(Debug, Clone)]
pub struct VariantGroup {
    pub variant: ServerVariant,
    pub applications: Vec<TestApplication>,
}

impl VariantGroup {
    /// 이 묶음의 케이스 목록을 선언 순서대로 반환합니다.
    pub fn cases(&self) -> Vec<TestCase> {
        self.applications
            .iter()
            .map(|app| TestCase::new(&self.variant.id, &app.id))
            .collect()
    }
}

/// 전개된 실행 계획
#[derive(Debug, Clone, Default)]
pub struct MatrixPlan {
    pub groups: Vec<VariantGroup>,
}

impl MatrixPlan {
    /// 선언 목록을 계획으로 전개합니다.
    pub fn expand(variants: &[ServerVariant], applications: &[TestApplication]) -> Self {
        let mut groups = Vec::new();
        for variant in variants {
            let runnable: Vec<TestApplication> = applications
                .iter()
                .filter(|app| app.runs_on(&variant.id))
                .cloned()
                .collect();
            if runnable.is_empty() {
                debug!(variant = %variant.id, "no runnable applications; variant skipped");
                continue;
            }
            groups.push(VariantGroup {
                variant: variant.clone(),
                applications: runnable,
            });
        }
        Self { groups }
    }

    /// 지정된 변형 id만 남깁니다 (빈 목록이면 전체 유지).
    pub fn retain_variants(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        self.groups.retain(|g| ids.contains(&g.variant.id));
    }

    /// 지정된 애플리케이션 id만 남깁니다 (빈 목록이면 전체 유지).
    ///
    /// 필터 결과 비어버린 묶음은 제거됩니다.
    pub fn retain_applications(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        for group in &mut self.groups {
            group.applications.retain(|app| ids.contains(&app.id));
        }
        self.groups.retain(|g| !g.applications.is_empty());
    }

    /// 계획에 포함된 케이스 총수
    pub fn case_count(&self) -> usize {
        self.groups.iter().map(|g| g.applications.len()).sum()
    }

    /// 전체 케이스 레이블 목록 (선언 순서)
    pub fn labels(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.cases())
            .map(|case| case.label())
            .collect()
    }
}
