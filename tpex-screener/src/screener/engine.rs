//! Screener engine module.
//!
//! Orchestrates a full screening run: roster, bounded fan-out of the
//! per-instrument pipeline, partition, sort, output.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::data::{Instrument, ProviderError, ScreeningPeriod};

use super::pipeline::{InstrumentPipeline, ScreeningResult};
use super::report::{Partition, ReportSink};

// ============================================================================
// Errors
// ============================================================================

/// Failures that abort a screening run.
#[derive(Debug, Error)]
pub enum ScreenerError {
    /// The roster could not be fetched; nothing is written.
    #[error("Instrument roster unavailable: {0}")]
    RosterUnavailable(#[source] ProviderError),

    /// The roster came back with no instruments; nothing is written.
    #[error("Instrument roster is empty")]
    EmptyRoster,

    /// A result table could not be written.
    #[error("Failed to write {partition} table: {source}")]
    Output {
        partition: Partition,
        #[source]
        source: tpex_common::Error,
    },
}

// ============================================================================
// Screening Report
// ============================================================================

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub period: ScreeningPeriod,
    /// Instruments in the roster
    pub total_scanned: usize,
    /// Matches without rule 5, in output order
    pub others: Vec<ScreeningResult>,
    /// Matches including rule 5, in output order
    pub condition5: Vec<ScreeningResult>,
    /// Where the others table was written
    pub others_location: String,
    /// Where the rule-5 table was written
    pub condition5_location: String,
    pub duration_secs: f64,
}

impl ScreeningReport {
    pub fn matched(&self) -> usize {
        self.others.len() + self.condition5.len()
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Screened {} instruments for {} in {:.1}s: {} matched ({} others, {} condition5)",
            self.total_scanned,
            self.period,
            self.duration_secs,
            self.matched(),
            self.others.len(),
            self.condition5.len()
        )
    }
}

// ============================================================================
// Screener Engine
// ============================================================================

/// Runs the screen across the whole roster.
pub struct ScreenerEngine {
    pipeline: Arc<InstrumentPipeline>,
    sink: Arc<dyn ReportSink>,
    concurrency: usize,
}

impl ScreenerEngine {
    pub fn new(pipeline: InstrumentPipeline, sink: Arc<dyn ReportSink>, concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// Run a full screen for `period` and write both result tables.
    pub async fn run(&self, period: ScreeningPeriod) -> Result<ScreeningReport, ScreenerError> {
        let started = Instant::now();
        let provider = self.pipeline.provider();

        info!(period = %period, provider = provider.name(), "Starting screening run");

        let roster = provider.fetch_roster().await.map_err(|e| {
            error!(
                error = %e,
                recoverable = e.is_recoverable(),
                "Failed to fetch instrument roster"
            );
            ScreenerError::RosterUnavailable(e)
        })?;

        if roster.is_empty() {
            error!("Instrument roster is empty");
            return Err(ScreenerError::EmptyRoster);
        }

        let total_scanned = roster.len();
        info!(total = total_scanned, concurrency = self.concurrency, "Screening instruments");

        let results = self.screen_all(roster, period).await;
        let (mut condition5, mut others): (Vec<_>, Vec<_>) = results
            .into_iter()
            .partition(|r| Partition::of(r) == Partition::Condition5);
        sort_others(&mut others);
        sort_condition5(&mut condition5);

        let others_location = self.write(&period, Partition::Others, &others)?;
        let condition5_location = self.write(&period, Partition::Condition5, &condition5)?;

        let report = ScreeningReport {
            period,
            total_scanned,
            others,
            condition5,
            others_location,
            condition5_location,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            others = %report.others_location,
            condition5 = %report.condition5_location,
            "{}",
            report.summary()
        );

        Ok(report)
    }

    /// Screen every instrument with at most `concurrency` in flight.
    ///
    /// Results come back in roster order regardless of completion order.
    async fn screen_all(
        &self,
        roster: Vec<Instrument>,
        period: ScreeningPeriod,
    ) -> Vec<ScreeningResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<Option<(usize, ScreeningResult)>> = JoinSet::new();

        for (index, instrument) in roster.into_iter().enumerate() {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let pipeline = Arc::clone(&self.pipeline);

            join_set.spawn(async move {
                let _permit = permit;
                pipeline
                    .run(&instrument, period)
                    .await
                    .map(|result| (index, result))
            });
        }

        let mut indexed = Vec::new();
        while let Some(task_result) = join_set.join_next().await {
            match task_result {
                Ok(Some(pair)) => indexed.push(pair),
                Ok(None) => {}
                Err(join_error) => {
                    // Task panicked or was cancelled
                    warn!(error = %join_error, "Screening task failed");
                }
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    fn write(
        &self,
        period: &ScreeningPeriod,
        partition: Partition,
        rows: &[ScreeningResult],
    ) -> Result<String, ScreenerError> {
        let location = self
            .sink
            .write_table(period, partition, rows)
            .map_err(|source| {
                error!(partition = %partition, error = %source, "Failed to write result table");
                ScreenerError::Output { partition, source }
            })?;

        if rows.is_empty() {
            info!(partition = %partition, location = %location, "No matching instruments");
        } else {
            info!(partition = %partition, location = %location, count = rows.len(), "Result table written");
        }
        Ok(location)
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Ascending gap, ties by descending multiplier. Stable.
pub fn sort_others(rows: &mut [ScreeningResult]) {
    rows.sort_by(|a, b| {
        a.ma_gap_pct
            .total_cmp(&b.ma_gap_pct)
            .then_with(|| b.volume_multiplier.total_cmp(&a.volume_multiplier))
    });
}

/// Descending multiplier. Stable.
pub fn sort_condition5(rows: &mut [ScreeningResult]) {
    rows.sort_by(|a, b| b.volume_multiplier.total_cmp(&a.volume_multiplier));
}
