//! funnelzero - Pure-Rust indicator spreadsheet normalizer and conversion funnel deriver
//!
//! This crate reads a "wide" indicator spreadsheet (one row per metric, one
//! column per reporting period) into a typed time-series model, and derives
//! conversion funnels from it.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use funnelzero::{FunnelConfig, FunnelBuilder, ParserBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Parse the first sheet of a workbook
//!     let parser = ParserBuilder::new().build()?;
//!     let model = parser.parse_workbook(File::open("indicators.xlsx")?)?;
//!
//!     // Derive the new-user funnel for one week
//!     let deriver = FunnelBuilder::from_config(FunnelConfig::new_user_conversion("0623-0629"))
//!         .build()?;
//!     let report = deriver.derive(&model);
//!
//!     for stage in &report.stages {
//!         println!("{}: {} ({:.2}%)", stage.stage, stage.value, stage.rate * 100.0);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Stages
//!
//! ```rust
//! use funnelzero::{parse, Cell, FunnelBuilder};
//!
//! # fn main() -> Result<(), funnelzero::FunnelError> {
//! let grid = vec![
//!     vec![Cell::Empty, Cell::from("P1"), Cell::from("P2")],
//!     vec![Cell::from("A"), Cell::from("10"), Cell::from("20")],
//!     vec![Cell::from("B"), Cell::from("5%"), Cell::from("/")],
//! ];
//! let model = parse(&grid)?;
//!
//! let report = FunnelBuilder::new()
//!     .with_stage("S1", "A")
//!     .with_stage("S2", "B")
//!     .with_target_period("P1")
//!     .build()?
//!     .derive(&model);
//!
//! assert_eq!(report.stages[0].value, 10.0);
//! assert_eq!(report.stages[1].value, 0.05);
//! # Ok(())
//! # }
//! ```
//!
//! # Cohort Conversion
//!
//! ```rust,no_run
//! use std::fs::File;
//! use funnelzero::{cohort, SourceLimits, WorkbookSource};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut source = WorkbookSource::open(File::open("users.xlsx")?, SourceLimits::default())?;
//!     let records = cohort::load_user_records(&mut source, &cohort::CohortColumns::default())?;
//!
//!     let days = cohort::conversion_by_day(&records, &cohort::Window::DEFAULT);
//!     let overall = cohort::overall(&days);
//!     println!("{} registrations", overall.registrations);
//!
//!     Ok(())
//! }
//! ```

mod builder;
mod chart;
pub mod cohort;
mod error;
pub mod export;
mod funnel;
mod normalize;
mod parser;
mod security;
mod types;

// 公開API
pub use builder::{parse, IndicatorParser, ParserBuilder};
pub use chart::{chart_series, ChartGroup, ChartPoint};
pub use error::FunnelError;
pub use funnel::{
    derive_funnel, FunnelBuilder, FunnelConfig, FunnelDeriver, FunnelReport, FunnelStageResult,
    FunnelStageSpec, ReturningShare, StageSource,
};
pub use normalize::DEFAULT_PLACEHOLDERS;
pub use parser::WorkbookSource;
pub use security::SourceLimits;
pub use types::{Cell, Indicator, NormalizedModel, NormalizedValue, Period, SeriesPoint};
