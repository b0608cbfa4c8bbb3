//! tracegrid-engine — 매트릭스 전개, 연습, 검증, 집계
//!
//! 계획([`MatrixPlan`])을 전개하고, 러너([`MatrixRunner`])가 세션마다
//! 배포 → 연습 → 셰이프 검증을 수행해 보고서([`MatrixReport`])를
//! 만듭니다.

pub mod exercise;
pub mod matrix;
pub mod report;
pub mod runner;
pub mod shape;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod support;

pub use exercise::ExerciseEngine;
pub use matrix::{MatrixPlan, VariantGroup};
pub use report::{CaseReport, MatrixReport, ResultAggregator, Totals};
pub use runner::MatrixRunner;
pub use shape::{ShapeMismatch, compare, name_matches};
pub use telemetry::{HttpTelemetryCollector, TelemetryCollector};
