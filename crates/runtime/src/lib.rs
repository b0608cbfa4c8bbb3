//! tracegrid-runtime — 컨테이너 세션 및 배포 계층
//!
//! 플랫폼 추상화([`ContainerPlatform`]), 세션 수명 주기
//! ([`SessionManager`]), 아티팩트 등록소([`ArtifactRegistry`]),
//! 배포 드라이버([`DeployDriver`])를 제공합니다.

pub mod deploy;
pub mod platform;
pub mod registry;
pub mod session;

pub use deploy::DeployDriver;
pub use platform::{BollardPlatform, ContainerPlatform, ContainerSpec};
pub use registry::{ArtifactRegistry, LocalArtifactRegistry};
pub use session::{RuntimeSession, SessionGuard, SessionManager};
