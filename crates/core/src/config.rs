//! 설정 관리 — tracegrid.toml 파싱 및 런타임 설정
//!
//! [`TracegridConfig`]는 매트릭스 선언과 오케스트레이터 설정을 담는
//! 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TRACEGRID_ORCHESTRATOR_STARTUP_TIMEOUT_SECS=60` 형식)
//! 3. 설정 파일 (`tracegrid.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tracegrid_core::error::TracegridError> {
//! use tracegrid_core::config::TracegridConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TracegridConfig::load("tracegrid.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TracegridConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TracegridError};
use crate::poll::BackoffPolicy;
use crate::types::{ServerVariant, TestApplication};

/// Tracegrid 통합 설정
///
/// `tracegrid.toml` 파일의 최상위 구조를 나타냅니다.
/// `[[variant]]` / `[[application]]` 배열 테이블이 매트릭스를 선언합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TracegridConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 오케스트레이터 설정
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// 컨테이너 플랫폼 설정
    #[serde(default)]
    pub platform: PlatformConfig,
    /// 아티팩트 레지스트리 설정
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 텔레메트리 수집기 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// 에이전트 부착 설정
    #[serde(default)]
    pub agent: AgentConfig,
    /// 선언된 서버 변형 목록
    #[serde(default)]
    pub variant: Vec<ServerVariant>,
    /// 선언된 테스트 애플리케이션 목록
    #[serde(default)]
    pub application: Vec<TestApplication>,
}

impl TracegridConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TracegridError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TracegridError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TracegridError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TracegridError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TracegridError> {
        toml::from_str(toml_str).map_err(|e| {
            TracegridError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TRACEGRID_{SECTION}_{FIELD}`
    /// (매트릭스 선언(`[[variant]]`, `[[application]]`)은 파일로만 선언합니다)
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TRACEGRID_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TRACEGRID_GENERAL_LOG_FORMAT");

        // Orchestrator
        override_usize(
            &mut self.orchestrator.max_concurrent_sessions,
            "TRACEGRID_ORCHESTRATOR_MAX_CONCURRENT_SESSIONS",
        );
        override_u64(
            &mut self.orchestrator.startup_timeout_secs,
            "TRACEGRID_ORCHESTRATOR_STARTUP_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.orchestrator.deploy_timeout_secs,
            "TRACEGRID_ORCHESTRATOR_DEPLOY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.orchestrator.telemetry_timeout_secs,
            "TRACEGRID_ORCHESTRATOR_TELEMETRY_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.orchestrator.suite_timeout_secs,
            "TRACEGRID_ORCHESTRATOR_SUITE_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.orchestrator.backoff_initial_ms,
            "TRACEGRID_ORCHESTRATOR_BACKOFF_INITIAL_MS",
        );
        override_u64(
            &mut self.orchestrator.backoff_max_ms,
            "TRACEGRID_ORCHESTRATOR_BACKOFF_MAX_MS",
        );

        // Platform
        override_string(
            &mut self.platform.docker_socket,
            "TRACEGRID_PLATFORM_DOCKER_SOCKET",
        );

        // Registry
        override_string(
            &mut self.registry.artifact_dir,
            "TRACEGRID_REGISTRY_ARTIFACT_DIR",
        );

        // Collector
        override_string(&mut self.collector.base_url, "TRACEGRID_COLLECTOR_BASE_URL");

        // Agent
        override_string(&mut self.agent.attach_args, "TRACEGRID_AGENT_ATTACH_ARGS");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TracegridError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.orchestrator.validate()?;

        // 매트릭스 선언 검증: id 중복과 빈 필드는 보고서 키를 망가뜨린다
        let mut variant_ids = HashSet::new();
        for variant in &self.variant {
            if variant.id.is_empty() || variant.image.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "variant".to_owned(),
                    reason: "variant id and image must not be empty".to_owned(),
                }
                .into());
            }
            if variant.http_port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("variant.{}.http_port", variant.id),
                    reason: "must be non-zero".to_owned(),
                }
                .into());
            }
            if variant.deployment_path.is_empty() || variant.jvm_env_variable.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("variant.{}", variant.id),
                    reason: "deployment_path and jvm_env_variable must not be empty".to_owned(),
                }
                .into());
            }
            if !variant_ids.insert(variant.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "variant".to_owned(),
                    reason: format!("duplicate variant id '{}'", variant.id),
                }
                .into());
            }
        }

        let mut application_ids = HashSet::new();
        for application in &self.application {
            if application.id.is_empty() || application.artifact.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "application".to_owned(),
                    reason: "application id and artifact must not be empty".to_owned(),
                }
                .into());
            }
            if !application_ids.insert(application.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "application".to_owned(),
                    reason: format!("duplicate application id '{}'", application.id),
                }
                .into());
            }
            for excluded in &application.excluded_variants {
                if !variant_ids.contains(excluded.as_str()) {
                    warn!(
                        application = application.id.as_str(),
                        excluded_variant = excluded.as_str(),
                        "excluded variant is not declared, exclusion has no effect"
                    );
                }
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 설정 상한값 상수
const MAX_CONCURRENT_SESSIONS: usize = 32;
const MAX_STARTUP_TIMEOUT_SECS: u64 = 3600;
const MAX_DEPLOY_TIMEOUT_SECS: u64 = 1800;
const MAX_TELEMETRY_TIMEOUT_SECS: u64 = 600;
const MAX_BACKOFF_MS: u64 = 60_000;

/// 오케스트레이터 설정
///
/// 모든 대기(기동 준비, 배포 완료, 텔레메트리 수집)의 상한과
/// 변형 간 병렬도를 결정합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 동시에 실행할 최대 세션(변형) 수
    pub max_concurrent_sessions: usize,
    /// 세션 기동 준비 타임아웃 (초)
    pub startup_timeout_secs: u64,
    /// 배포 완료 타임아웃 (초)
    pub deploy_timeout_secs: u64,
    /// 텔레메트리 스냅샷 타임아웃 (초)
    pub telemetry_timeout_secs: u64,
    /// 전체 스위트 타임아웃 (초, 0이면 무제한)
    pub suite_timeout_secs: u64,
    /// 폴링 백오프 초기 간격 (밀리초)
    pub backoff_initial_ms: u64,
    /// 폴링 백오프 간격 상한 (밀리초)
    pub backoff_max_ms: u64,
    /// 폴링 백오프 증가 배율
    pub backoff_multiplier: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 2,
            startup_timeout_secs: 120,
            deploy_timeout_secs: 60,
            telemetry_timeout_secs: 10,
            suite_timeout_secs: 0,
            backoff_initial_ms: 500,
            backoff_max_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl OrchestratorConfig {
    /// 폴링 백오프 정책을 반환합니다.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
            self.backoff_multiplier,
        )
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_sessions == 0
            || self.max_concurrent_sessions > MAX_CONCURRENT_SESSIONS
        {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.max_concurrent_sessions".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENT_SESSIONS}"),
            });
        }
        if self.startup_timeout_secs == 0 || self.startup_timeout_secs > MAX_STARTUP_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.startup_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_STARTUP_TIMEOUT_SECS}"),
            });
        }
        if self.deploy_timeout_secs == 0 || self.deploy_timeout_secs > MAX_DEPLOY_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.deploy_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_DEPLOY_TIMEOUT_SECS}"),
            });
        }
        if self.telemetry_timeout_secs == 0
            || self.telemetry_timeout_secs > MAX_TELEMETRY_TIMEOUT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.telemetry_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_TELEMETRY_TIMEOUT_SECS}"),
            });
        }
        if self.backoff_initial_ms == 0 || self.backoff_initial_ms > MAX_BACKOFF_MS {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.backoff_initial_ms".to_owned(),
                reason: format!("must be 1-{MAX_BACKOFF_MS}"),
            });
        }
        if self.backoff_max_ms < self.backoff_initial_ms || self.backoff_max_ms > MAX_BACKOFF_MS {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.backoff_max_ms".to_owned(),
                reason: format!("must be backoff_initial_ms-{MAX_BACKOFF_MS}"),
            });
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.backoff_multiplier".to_owned(),
                reason: "must be >= 1.0".to_owned(),
            });
        }
        Ok(())
    }
}

/// 컨테이너 플랫폼 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
        }
    }
}

/// 아티팩트 레지스트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 아티팩트 디렉토리 (상대 로케이터의 기준 경로)
    pub artifact_dir: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            artifact_dir: "artifacts".to_owned(),
        }
    }
}

/// 텔레메트리 수집기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 수집기 기본 URL
    pub base_url: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8200".to_owned(),
        }
    }
}

/// 에이전트 부착 설정
///
/// 각 변형의 환경변수 채널에 주입할 JVM 인자입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 에이전트 부착 인자 (예: "-javaagent:/agent/agent.jar")
    pub attach_args: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            attach_args: "-javaagent:/agent/agent.jar".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
