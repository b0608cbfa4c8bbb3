//! 배포 아티팩트 조회
//!
//! 애플리케이션 선언의 `artifact` 로케이터를 실제 파일 경로로 해석합니다.
//! 등록소는 실행 전 사전 점검(모든 선언된 아티팩트가 존재하는지)에도
//! 사용됩니다.

use std::path::{Path, PathBuf};

use tracegrid_core::error::SessionError;
use tracegrid_core::types::TestApplication;

/// 아티팩트 로케이터를 파일 경로로 해석하는 트레이트
pub trait ArtifactRegistry: Send + Sync + 'static {
    /// 애플리케이션의 아티팩트 경로를 반환합니다.
    ///
    /// 파일이 존재하지 않으면 `SessionError::ArtifactMissing`을 반환합니다.
    fn resolve(&self, application: &TestApplication) -> Result<PathBuf, SessionError>;
}

/// 로컬 파일시스템 기반 등록소
///
/// 절대 경로 로케이터는 그대로 사용하고, 상대 로케이터는 `artifact_dir`
/// 아래에서 찾습니다.
pub struct LocalArtifactRegistry {
    artifact_dir: PathBuf,
}

impl LocalArtifactRegistry {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }
}

impl ArtifactRegistry for LocalArtifactRegistry {
    fn resolve(&self, application: &TestApplication) -> Result<PathBuf, SessionError> {
        let locator = Path::new(&application.artifact);
        let path = if locator.is_absolute() {
            locator.to_path_buf()
        } else {
            self.artifact_dir.join(locator)
        };

        if !path.is_file() {
            return Err(SessionError::ArtifactMissing {
                application: application.id.clone(),
                reason: format!("no file at {}", path.display()),
            });
        }
        Ok(path)
    }
}
