//! Per-instrument screening: fetch, merge, compute, evaluate, enrich.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{DailyBar, IndustryLookup, Instrument, MarketDataProvider, ScreeningPeriod};
use crate::indicator::compute_indicators;

use super::conditions::{rule_labels, ConditionEvaluator, Rule};

// ============================================================================
// Screening Result
// ============================================================================

/// An instrument that matched at least one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub instrument: Instrument,
    /// Close of the latest session
    pub close_price: f64,
    /// Non-empty set of matched rules
    pub rules: BTreeSet<Rule>,
    pub volume_multiplier: f64,
    pub industry: String,
    pub industry_chain: String,
    /// MA10/MA5 gap at the latest session (%)
    pub ma_gap_pct: f64,
}

impl ScreeningResult {
    /// Whether the volume surge rule fired.
    pub fn is_surge(&self) -> bool {
        self.rules.contains(&Rule::Condition5)
    }
}

// ============================================================================
// History Merge
// ============================================================================

/// Concatenate monthly histories, keep the first bar seen for each date and
/// sort ascending.
///
/// Months are passed target month first, so its rows win on overlap.
pub fn merge_histories(months: Vec<Vec<DailyBar>>) -> Vec<DailyBar> {
    let mut seen = HashSet::new();
    let mut merged: Vec<DailyBar> = months
        .into_iter()
        .flatten()
        .filter(|bar| seen.insert(bar.date))
        .collect();
    merged.sort_by_key(|bar| bar.date);
    merged
}

// ============================================================================
// Instrument Pipeline
// ============================================================================

/// Runs the screen for one instrument at a time.
///
/// Shared read-only across worker tasks.
pub struct InstrumentPipeline {
    provider: Arc<dyn MarketDataProvider>,
    industry: Arc<dyn IndustryLookup>,
    evaluator: ConditionEvaluator,
}

impl InstrumentPipeline {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        industry: Arc<dyn IndustryLookup>,
        evaluator: ConditionEvaluator,
    ) -> Self {
        Self {
            provider,
            industry,
            evaluator,
        }
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    /// Screen one instrument. Every failure is logged and yields `None`.
    pub async fn run(
        &self,
        instrument: &Instrument,
        period: ScreeningPeriod,
    ) -> Option<ScreeningResult> {
        let id = instrument.id.as_str();
        let min_rows = self.evaluator.thresholds().min_rows;

        let mut months = Vec::with_capacity(2);
        for month in [period, period.previous()] {
            match self
                .provider
                .fetch_monthly_history(id, month.year, month.month)
                .await
            {
                Ok(bars) if !bars.is_empty() => months.push(bars),
                Ok(_) => warn!(
                    instrument = %id,
                    year = month.year,
                    month = month.month,
                    "Empty monthly history"
                ),
                Err(e) => warn!(
                    instrument = %id,
                    year = month.year,
                    month = month.month,
                    error = %e,
                    recoverable = e.is_recoverable(),
                    "Monthly history fetch failed"
                ),
            }
        }

        if months.is_empty() {
            warn!(instrument = %id, "No usable history");
            return None;
        }

        let merged = merge_histories(months);
        if merged.len() < min_rows {
            warn!(instrument = %id, rows = merged.len(), "Fewer than {} sessions", min_rows);
            return None;
        }

        let cutoff = period.last_trading_day();
        let bars: Vec<DailyBar> = merged.into_iter().filter(|b| b.date <= cutoff).collect();
        if bars.len() < min_rows {
            warn!(
                instrument = %id,
                rows = bars.len(),
                cutoff = %cutoff,
                "Fewer than {} sessions up to the last trading day",
                min_rows
            );
            return None;
        }

        let series = compute_indicators(&bars);
        let evaluation = self.evaluator.evaluate(&series);
        if !evaluation.is_match() {
            debug!(instrument = %id, "No rule matched");
            return None;
        }
        let latest = series.last()?;

        let industry = self.industry.fetch_industry(id).await;

        let result = ScreeningResult {
            instrument: instrument.clone(),
            close_price: latest.close,
            volume_multiplier: evaluation.volume_multiplier(),
            ma_gap_pct: evaluation.gap_pct,
            industry: industry.industry,
            industry_chain: industry.industry_chain,
            rules: evaluation.rules,
        };

        info!(instrument = %id, rules = %rule_labels(&result.rules), "Instrument matched");
        Some(result)
    }
}
