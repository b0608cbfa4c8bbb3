//! Tracegrid 공통 크레이트 — 도메인 타입, 에러, 설정, 폴링 정책
//!
//! 매트릭스 오케스트레이터의 모든 크레이트가 공유하는 기반입니다.
//! 선언(변형/애플리케이션), 케이스 결과, 에러 분류(인프라 vs 행동),
//! 상한이 있는 폴링 정책을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod poll;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, PlatformError, SessionError, TracegridError, VerifyError};

// 설정
pub use config::TracegridConfig;

// 폴링
pub use poll::{BackoffPolicy, PollOutcome, poll_until};

// 도메인 타입
pub use types::{
    CapturedSpan, CapturedTransaction, CaseResult, DeploymentRecord, DeploymentState,
    ExpectedShape, ExpectedSpan, ExpectedTransaction, RequestSpec, ServerVariant, TelemetrySnapshot,
    TestApplication, TestCase,
};
