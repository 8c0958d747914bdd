//! Breakout screener.
//!
//! # Flow
//!
//! ```text
//! roster ──▶ per-instrument pipeline (bounded pool) ──▶ partition ──▶ sort ──▶ tables
//!              │
//!              ├─ fetch target + previous month
//!              ├─ merge, dedupe, cut at last trading day
//!              ├─ indicators (MA5/10/20, volume MA5/10, RSI14)
//!              ├─ rules 1-5
//!              └─ industry lookup (matches only)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let pipeline = InstrumentPipeline::new(provider, industry, ConditionEvaluator::default());
//! let engine = ScreenerEngine::new(pipeline, Arc::new(CsvReportSink::new(dir)), 20);
//! let report = engine.run("2024/05".parse()?).await?;
//! ```

pub mod conditions;
pub mod engine;
pub mod pipeline;
pub mod report;

pub use conditions::{rule_labels, ConditionEvaluator, Evaluation, Rule, RuleThresholds};
pub use engine::{sort_condition5, sort_others, ScreenerEngine, ScreenerError, ScreeningReport};
pub use pipeline::{merge_histories, InstrumentPipeline, ScreeningResult};
pub use report::{render_table, CsvReportSink, Partition, ReportSink};
