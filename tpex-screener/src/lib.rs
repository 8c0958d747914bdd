//! TPEx Screener - Technical breakout screener for TPEx-listed equities.
//!
//! Scans the OTC roster once per month selection, computes moving averages
//! and RSI per instrument, applies five breakout rules and writes two CSV
//! tables: surge matches and everything else.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod indicator;
pub mod screener;

use std::sync::Arc;
use tpex_common::Config;

use data::{IndustryChainClient, ScreeningPeriod, TpexAdapter};
use screener::{
    ConditionEvaluator, CsvReportSink, InstrumentPipeline, ScreenerEngine, ScreenerError,
    ScreeningReport,
};

/// Build an engine wired to the live TPEx endpoints and the CSV sink.
pub fn build_engine(config: &Config) -> ScreenerEngine {
    let pipeline = InstrumentPipeline::new(
        Arc::new(TpexAdapter::from_config(&config.data_source)),
        Arc::new(IndustryChainClient::from_config(&config.data_source)),
        ConditionEvaluator::default(),
    );
    let sink = Arc::new(CsvReportSink::new(config.output.dir.clone()));

    ScreenerEngine::new(pipeline, sink, config.screener.concurrency)
}

/// Run one screening pass with the given configuration.
pub async fn run(config: &Config, period: ScreeningPeriod) -> Result<ScreeningReport, ScreenerError> {
    build_engine(config).run(period).await
}
