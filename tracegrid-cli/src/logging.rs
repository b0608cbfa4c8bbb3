//! tracegrid의 로깅 초기화
//!
//! `[general]` 설정으로 `tracing-subscriber`를 구성합니다. 레벨과 형식의
//! 우선순위는 CLI 플래그(`--log-level`/`--log-format`) > `TRACEGRID_GENERAL_*`
//! 환경변수 > 설정 파일이며, 이 합성은 호출자가 설정값에 미리 반영합니다.
//! `RUST_LOG`가 설정되어 있으면 모듈별 지시문을 포함한 필터 전체가 설정
//! 레벨을 대체합니다.

use anyhow::{Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use tracegrid_core::config::GeneralConfig;

/// 출력 형식
///
/// * `Json` — 줄 단위 JSON (CI 로그 보관용)
/// * `Pretty` — 사람이 읽는 컬러 출력 (로컬 실행용)
enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// 전역 구독자를 등록합니다. 프로세스당 정확히 한 번 호출해야 합니다.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let Some(format) = LogFormat::parse(&config.log_format) else {
        bail!(
            "unknown log format '{}', expected 'json' or 'pretty'",
            config.log_format
        );
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let base = tracing_subscriber::registry().with(filter);

    let init: Result<(), TryInitError> = match format {
        LogFormat::Json => base
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false),
            )
            .try_init(),
        LogFormat::Pretty => base
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    init.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }
}
