//! 에러 타입 — 도메인별 에러 정의
//!
//! 케이스 수준의 실패(인프라/행동/스킵)는 [`crate::types::CaseResult`] 데이터로
//! 표현되며 에러가 아닙니다. 이 모듈의 에러는 오케스트레이션 기계 내부의
//! 실패를 나타내고, 러너 경계에서 케이스 결과로 변환됩니다.

/// Tracegrid 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TracegridError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 플랫폼 에러
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// 런타임 세션 에러
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// 연습/검증 에러
    #[error("verify error: {0}")]
    Verify(#[from] VerifyError),

    /// 실행 전제조건 실패 — 매트릭스를 시작하지 않고 전체 실행을 중단하는
    /// 유일한 치명적 경로입니다.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 플랫폼(Docker) 에러
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// 데몬 연결 실패
    #[error("platform connection error: {0}")]
    Connection(String),

    /// API 호출 실패
    #[error("platform api error: {0}")]
    Api(String),

    /// 컨테이너를 찾을 수 없음
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// 컨테이너 액션 실패
    #[error("container action failed for '{container_id}': {reason}")]
    ActionFailed {
        /// 대상 컨테이너 ID
        container_id: String,
        /// 실패 사유
        reason: String,
    },
}

/// 런타임 세션 에러
///
/// 세션 기동/배포 기계의 실패를 나타냅니다. 진단 출력(컨테이너 로그 꼬리)은
/// 트리아지를 위해 에러에 실려 케이스의 InfraFailure 상세로 전달됩니다.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 컨테이너 기동 실패
    #[error("session start failed for variant '{variant}': {reason}")]
    StartFailed {
        /// 대상 변형 id
        variant: String,
        /// 실패 사유
        reason: String,
    },

    /// 준비 프로브 타임아웃
    #[error("variant '{variant}' not ready after {waited_secs}s; logs:\n{diagnostics}")]
    ReadinessTimeout {
        /// 대상 변형 id
        variant: String,
        /// 대기한 시간 (초)
        waited_secs: u64,
        /// 캡처된 컨테이너 로그 꼬리
        diagnostics: String,
    },

    /// 배포 완료 타임아웃 — 해당 케이스만 실패시킵니다.
    #[error("application '{application}' not deployed after {waited_secs}s")]
    DeployTimeout {
        /// 대상 애플리케이션 id
        application: String,
        /// 대기한 시간 (초)
        waited_secs: u64,
    },

    /// 세션 자체가 응답 불능 — 세션 수준 실패로 승격되어
    /// 해당 세션의 남은 케이스를 단락시킵니다.
    #[error("session for variant '{variant}' became unreachable: {reason}")]
    Unreachable {
        /// 대상 변형 id
        variant: String,
        /// 사유
        reason: String,
    },

    /// 아티팩트를 찾을 수 없음
    #[error("artifact for application '{application}' unavailable: {reason}")]
    ArtifactMissing {
        /// 대상 애플리케이션 id
        application: String,
        /// 사유
        reason: String,
    },

    /// 외부 취소 신호로 중단됨
    #[error("operation cancelled")]
    Cancelled,

    /// 플랫폼 에러 전파
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// 연습/검증 에러
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// 연습 요청 전송 실패
    #[error("exercise request to '{url}' failed: {reason}")]
    RequestFailed {
        /// 요청 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// 텔레메트리 수집기 호출 실패
    #[error("telemetry collector error: {0}")]
    Collector(String),

    /// 스냅샷 부재 — 타임아웃까지 폴링했으나 텔레메트리가 도착하지 않음
    #[error("telemetry snapshot absent after {waited_secs}s")]
    SnapshotAbsent {
        /// 대기한 시간 (초)
        waited_secs: u64,
    },
}

impl SessionError {
    /// 세션 수준 실패 여부 — true이면 같은 세션의 남은 케이스를 단락시킵니다.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::StartFailed { .. } | Self::ReadinessTimeout { .. } | Self::Unreachable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_timeout_display_carries_diagnostics() {
        let err = SessionError::ReadinessTimeout {
            variant: "rt-14".to_owned(),
            waited_secs: 120,
            diagnostics: "OutOfMemoryError".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rt-14"));
        assert!(msg.contains("120"));
        assert!(msg.contains("OutOfMemoryError"));
    }

    #[test]
    fn deploy_timeout_is_not_session_fatal() {
        let err = SessionError::DeployTimeout {
            application: "soap-app".to_owned(),
            waited_secs: 60,
        };
        assert!(!err.is_session_fatal());
    }

    #[test]
    fn unreachable_and_start_failures_are_session_fatal() {
        let unreachable = SessionError::Unreachable {
            variant: "rt-14".to_owned(),
            reason: "container exited".to_owned(),
        };
        let start = SessionError::StartFailed {
            variant: "rt-14".to_owned(),
            reason: "image pull failed".to_owned(),
        };
        assert!(unreachable.is_session_fatal());
        assert!(start.is_session_fatal());
    }

    #[test]
    fn platform_error_converts_to_session_error() {
        let err: SessionError = PlatformError::Connection("socket missing".to_owned()).into();
        assert!(err.to_string().contains("socket missing"));
        assert!(!err.is_session_fatal());
    }

    #[test]
    fn sub_errors_convert_to_top_level() {
        let err: TracegridError = ConfigError::InvalidValue {
            field: "startup_timeout_secs".to_owned(),
            reason: "must be 1-3600".to_owned(),
        }
        .into();
        assert!(matches!(err, TracegridError::Config(_)));

        let err: TracegridError = VerifyError::SnapshotAbsent { waited_secs: 10 }.into();
        assert!(matches!(err, TracegridError::Verify(_)));
    }

    #[test]
    fn action_failed_display() {
        let err = PlatformError::ActionFailed {
            container_id: "abc123".to_owned(),
            reason: "remove failed".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("remove failed"));
    }
}
