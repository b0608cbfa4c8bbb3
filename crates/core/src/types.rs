//! 도메인 타입 — 매트릭스 전역에서 사용되는 공통 타입
//!
//! 서버 변형(variant), 테스트 애플리케이션, 테스트 케이스, 기대 텔레메트리
//! 셰이프 등 모든 크레이트가 공유하는 데이터 구조를 정의합니다.
//! 선언 타입(`ServerVariant`, `TestApplication`)은 설정 파일에서 역직렬화되며
//! 선언 이후 불변입니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 테스트 대상 서버 변형
///
/// 하나의 버전이 지정된 관리 런타임(예: "wildfly-14")을 나타냅니다.
/// 에이전트 부착 인자는 변형마다 다른 환경변수 채널(`jvm_env_variable`)을
/// 통해 주입됩니다 — 오케스트레이터에 하드코딩하지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerVariant {
    /// 변형 식별자 (보고서 키로 사용)
    pub id: String,
    /// 컨테이너 이미지 참조 (예: "jboss/wildfly:14.0.0.Final")
    pub image: String,
    /// 컨테이너 내부 HTTP 포트
    pub http_port: u16,
    /// 아티팩트 배포 디렉토리 (컨테이너 내부 경로)
    pub deployment_path: String,
    /// JVM 인자 주입 환경변수명 (예: "JAVA_OPTS", "CATALINA_OPTS")
    pub jvm_env_variable: String,
    /// 에이전트 인자와 함께 재주입할 추가 시스템 프로퍼티
    ///
    /// 환경변수 채널을 덮어쓰면 이미지 기본값이 사라지는 변형이 있어
    /// (예: WildFly의 `java.net.preferIPv4Stack`) 명시적으로 선언합니다.
    #[serde(default)]
    pub extra_properties: Vec<(String, String)>,
}

impl fmt::Display for ServerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.image)
    }
}

/// 배포 가능한 테스트 애플리케이션
///
/// 아티팩트 위치, 배포 후 연습(exercise)할 요청 목록, 기대 텔레메트리
/// 셰이프를 선언합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestApplication {
    /// 애플리케이션 식별자 (보고서 키로 사용)
    pub id: String,
    /// 아티팩트 로케이터 — 절대/상대 경로 또는 레지스트리 디렉토리 내 파일명
    pub artifact: String,
    /// 배포 후 노출되는 컨텍스트 경로 (예: "/servlet-app")
    pub context_path: String,
    /// 배포 완료 확인용 경로 (미지정 시 컨텍스트 경로 루트)
    #[serde(default)]
    pub ready_path: Option<String>,
    /// 연습 단계에서 전송할 요청 목록
    pub requests: Vec<RequestSpec>,
    /// 이 애플리케이션을 제외할 변형 id 목록
    #[serde(default)]
    pub excluded_variants: Vec<String>,
    /// 기대 텔레메트리 셰이프
    pub expected: ExpectedShape,
}

impl TestApplication {
    /// 해당 변형에서 이 애플리케이션이 실행 가능한지 여부를 반환합니다.
    pub fn runs_on(&self, variant_id: &str) -> bool {
        !self.excluded_variants.iter().any(|v| v == variant_id)
    }

    /// 배포 완료 확인에 사용할 경로를 반환합니다.
    pub fn readiness_path(&self) -> &str {
        self.ready_path.as_deref().unwrap_or(&self.context_path)
    }
}

/// 연습 단계의 단일 HTTP 요청 선언
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    /// HTTP 메서드 (기본값 GET)
    #[serde(default = "default_method")]
    pub method: String,
    /// 요청 경로 (컨텍스트 경로 포함, 예: "/servlet-app/ping")
    pub path: String,
}

fn default_method() -> String {
    "GET".to_owned()
}

/// 기대 텔레메트리 셰이프 — 트랜잭션 기술자 집합
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectedShape {
    /// 기대 트랜잭션 목록
    pub transactions: Vec<ExpectedTransaction>,
}

/// 기대 트랜잭션 기술자
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedTransaction {
    /// 트랜잭션 이름 — 정확한 문자열 또는 `*` 글롭 패턴
    pub name: String,
    /// 기대 상태 코드 (정확히 일치해야 함)
    pub status: u16,
    /// 기대 자식 스팬 집합 (순서 무관)
    #[serde(default)]
    pub spans: Vec<ExpectedSpan>,
}

/// 기대 자식 스팬 기술자
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedSpan {
    /// 스팬 이름 (정확히 일치해야 함)
    pub name: String,
    /// 기대 출현 횟수 (기본값 1)
    #[serde(default = "default_span_count")]
    pub count: usize,
}

fn default_span_count() -> usize {
    1
}

/// 테스트 케이스 — (변형, 애플리케이션) 쌍
///
/// 매트릭스는 선언된 변형 × 애플리케이션의 데카르트 곱에서
/// `excluded_variants`를 뺀 집합입니다. 케이스는 쌍으로 유일하게 식별됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestCase {
    /// 서버 변형 id
    pub variant_id: String,
    /// 애플리케이션 id
    pub application_id: String,
}

impl TestCase {
    /// 새 테스트 케이스를 생성합니다.
    pub fn new(variant_id: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self {
            variant_id: variant_id.into(),
            application_id: application_id.into(),
        }
    }

    /// 보고서용 케이스 레이블을 반환합니다 (`변형/애플리케이션`).
    pub fn label(&self) -> String {
        format!("{}/{}", self.variant_id, self.application_id)
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.variant_id, self.application_id)
    }
}

/// 캡처된 텔레메트리 스냅샷
///
/// 외부 텔레메트리 수집기가 생성한 읽기 전용 데이터입니다.
/// 케이스당 한 번 검증에 소비됩니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// 캡처된 트랜잭션 목록
    pub transactions: Vec<CapturedTransaction>,
}

/// 캡처된 트랜잭션
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedTransaction {
    /// 트랜잭션 이름
    pub name: String,
    /// 응답 상태 코드
    pub status: u16,
    /// 캡처된 자식 스팬 목록
    #[serde(default)]
    pub spans: Vec<CapturedSpan>,
}

/// 캡처된 자식 스팬
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedSpan {
    /// 스팬 이름
    pub name: String,
}

/// 케이스 결과
///
/// 인프라 실패와 행동(텔레메트리 셰이프) 실패를 구분합니다 —
/// "테스트 인프라 고장"과 "실제 회귀"를 나누는 것이 이 시스템의 목적입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CaseResult {
    /// 텔레메트리 셰이프가 기대와 일치
    Pass,
    /// 텔레메트리는 수집되었으나 셰이프 불일치 — 에이전트 결함 의심
    BehavioralFailure(String),
    /// 런타임 기동/배포/텔레메트리 수집 실패 — 에이전트와 무관
    InfraFailure(String),
    /// 취소 또는 상위 세션 실패로 시도하지 않음
    Skipped(String),
}

impl CaseResult {
    /// 결과 종류의 고정 이름을 반환합니다 (메트릭 레이블용).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::BehavioralFailure(_) => "behavioral_failure",
            Self::InfraFailure(_) => "infra_failure",
            Self::Skipped(_) => "skipped",
        }
    }

    /// 통과 여부를 반환합니다.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// 실패/스킵 상세를 반환합니다.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::BehavioralFailure(d) | Self::InfraFailure(d) | Self::Skipped(d) => Some(d),
        }
    }
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.kind_name(), detail),
            None => write!(f, "{}", self.kind_name()),
        }
    }
}

/// 배포 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    /// 전송됨, 완료 대기 중
    Pending,
    /// 배포 완료 확인됨
    Deployed,
    /// 배포 실패
    Failed,
}

/// 배포 레코드 — 하나의 (세션, 애플리케이션) 배포 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// 대상 세션 id
    pub session_id: Uuid,
    /// 배포된 애플리케이션 id
    pub application_id: String,
    /// 배포 상태
    pub state: DeploymentState,
    /// 완료 시각 (완료 확인 시에만 기록)
    pub completed_at: Option<SystemTime>,
}
