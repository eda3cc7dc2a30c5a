//! Funnel Module
//!
//! 正規化済みモデルから、ステージごとの値と転換率を導出します。

mod config;
mod derive;

pub use config::{FunnelBuilder, FunnelConfig, FunnelStageSpec, StageSource};
pub use derive::{derive_funnel, FunnelDeriver, FunnelReport, FunnelStageResult, ReturningShare};
