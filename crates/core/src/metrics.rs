//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()` / `metrics::gauge!()`
//! 매크로를 호출합니다. exporter 설치는 임베더의 몫입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tracegrid_`
//! - 접미어: `_total` (counter), 없음 (gauge)

use metrics::{describe_counter, describe_gauge};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 케이스 결과 레이블 키 (pass, behavioral_failure, infra_failure, skipped)
pub const LABEL_OUTCOME: &str = "outcome";

/// 서버 변형 레이블 키
pub const LABEL_VARIANT: &str = "variant";

// ─── Runner 메트릭 ─────────────────────────────────────────────────

/// 완료된 케이스 수 (counter, label: outcome)
pub const CASES_TOTAL: &str = "tracegrid_cases_total";

/// 기동된 런타임 세션 수 (counter, label: variant)
pub const SESSIONS_STARTED_TOTAL: &str = "tracegrid_sessions_started_total";

/// 정리(teardown)된 세션 수 (counter, label: variant)
pub const SESSIONS_TORN_DOWN_TOTAL: &str = "tracegrid_sessions_torn_down_total";

/// 현재 실행 중인 세션 수 (gauge)
pub const SESSIONS_LIVE: &str = "tracegrid_sessions_live";

/// 배포 완료 수 (counter, label: variant)
pub const DEPLOYMENTS_TOTAL: &str = "tracegrid_deployments_total";

/// 메트릭 설명을 exporter에 등록합니다.
///
/// exporter 설치 직후 한 번 호출합니다. exporter가 없으면 no-op입니다.
pub fn describe_metrics() {
    describe_counter!(CASES_TOTAL, "Completed matrix cases by outcome");
    describe_counter!(SESSIONS_STARTED_TOTAL, "Runtime sessions started");
    describe_counter!(SESSIONS_TORN_DOWN_TOTAL, "Runtime sessions torn down");
    describe_gauge!(SESSIONS_LIVE, "Currently live runtime sessions");
    describe_counter!(DEPLOYMENTS_TOTAL, "Completed application deployments");
}
