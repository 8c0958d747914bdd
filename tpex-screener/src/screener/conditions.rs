//! Breakout rule evaluation.
//!
//! Two volume detectors gate five price/momentum rules:
//!
//! - **Signal A** (rules 1-4): a bullish session within the last three whose
//!   volume is at least 1.5x both of its own volume averages.
//! - **Signal B** (rule 5): the latest session's volume is at least 2x both
//!   volume averages.
//!
//! Any missing indicator makes the predicate that reads it false.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::indicator::IndicatorBar;

// ============================================================================
// Rule
// ============================================================================

/// Rule identifiers, rendered as `條件1` .. `條件5` in result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// MA5 converging up into MA10 under MA20, RSI holding
    Condition1,
    /// Same convergence with a weak but rising RSI
    Condition2,
    /// MA5 just crossed above MA10, still under MA20
    Condition3,
    /// MA5 between MA10 and MA20 with RSI >= 50
    Condition4,
    /// Volume surge with MA5 above MA20
    Condition5,
}

impl Rule {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Condition1 => "條件1",
            Self::Condition2 => "條件2",
            Self::Condition3 => "條件3",
            Self::Condition4 => "條件4",
            Self::Condition5 => "條件5",
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Rule labels joined for display, e.g. `條件1, 條件4`.
pub fn rule_labels(rules: &BTreeSet<Rule>) -> String {
    rules.iter().map(Rule::label).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// Thresholds
// ============================================================================

/// Numeric thresholds for the rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleThresholds {
    /// Minimum rows in the series
    pub min_rows: usize,
    /// Minimum latest-session volume in lots
    pub min_volume: u64,
    /// Sessions scanned backward for signal A
    pub lookback_days: usize,
    /// Signal A volume ratio against each volume average
    pub breakout_ratio: f64,
    /// Signal B volume ratio against each volume average
    pub surge_ratio: f64,
    /// Inclusive lower bound of the MA10/MA5 gap (%)
    pub gap_min_pct: f64,
    /// Exclusive upper bound of the MA10/MA5 gap (%)
    pub gap_max_pct: f64,
    /// RSI floor for rule 1 (rule 2 applies below it)
    pub rsi_momentum: f64,
    /// RSI floor for rules 3 and 4
    pub rsi_strength: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            min_rows: 20,
            min_volume: 200,
            lookback_days: 3,
            breakout_ratio: 1.5,
            surge_ratio: 2.0,
            gap_min_pct: 0.0,
            gap_max_pct: 1.0,
            rsi_momentum: 49.0,
            rsi_strength: 50.0,
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Outcome of evaluating one instrument's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Rules that fired (empty when nothing matched)
    pub rules: BTreeSet<Rule>,
    /// `(ma10 - ma5) / ma5 * 100` at the latest session, `+inf` when undefined
    pub gap_pct: f64,
    /// Signal A multiplier, if signal A fired
    pub multiplier_a: Option<f64>,
    /// Signal B multiplier, if signal B fired
    pub multiplier_b: Option<f64>,
}

impl Evaluation {
    fn no_match() -> Self {
        Self {
            rules: BTreeSet::new(),
            gap_pct: f64::INFINITY,
            multiplier_a: None,
            multiplier_b: None,
        }
    }

    pub fn is_match(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn has(&self, rule: Rule) -> bool {
        self.rules.contains(&rule)
    }

    /// Multiplier reported for the result row.
    ///
    /// Signal B's when rule 5 fired, otherwise signal A's.
    pub fn volume_multiplier(&self) -> f64 {
        let multiplier = if self.has(Rule::Condition5) {
            self.multiplier_b
        } else {
            self.multiplier_a
        };
        multiplier.unwrap_or(0.0)
    }
}

// ============================================================================
// Condition Evaluator
// ============================================================================

/// Applies the breakout rules to an indicator series.
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    thresholds: RuleThresholds,
}

impl ConditionEvaluator {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Evaluate a series whose last element is the latest session.
    pub fn evaluate(&self, series: &[IndicatorBar]) -> Evaluation {
        let t = &self.thresholds;

        if series.len() < t.min_rows.max(2) {
            return Evaluation::no_match();
        }
        let (latest, prev) = match series {
            [.., prev, latest] => (latest, prev),
            _ => return Evaluation::no_match(),
        };
        if latest.volume < t.min_volume {
            return Evaluation::no_match();
        }

        let gap_pct = gap_pct(latest);
        let multiplier_a = self.signal_a(series);
        let multiplier_b = self.signal_b(latest);

        let mut rules = BTreeSet::new();

        if multiplier_a.is_some() {
            if let (Some(ma5), Some(ma10), Some(ma20)) = (latest.ma5, latest.ma10, latest.ma20) {
                let converging = gap_pct >= t.gap_min_pct
                    && gap_pct < t.gap_max_pct
                    && ma5 < ma10
                    && ma10 < ma20
                    && prev.ma5.is_some_and(|p| ma5 > p);

                if converging && latest.rsi14 >= t.rsi_momentum {
                    rules.insert(Rule::Condition1);
                }
                if converging && latest.rsi14 < t.rsi_momentum && latest.rsi14 > prev.rsi14 {
                    rules.insert(Rule::Condition2);
                }

                let between = ma10 < ma5 && ma5 < ma20;
                let crossed = matches!((prev.ma5, prev.ma10), (Some(p5), Some(p10)) if p5 <= p10);
                if ma5 > ma10 && between && crossed && latest.rsi14 >= t.rsi_strength {
                    rules.insert(Rule::Condition3);
                }
                if between && latest.rsi14 >= t.rsi_strength {
                    rules.insert(Rule::Condition4);
                }
            }
        }

        if multiplier_b.is_some() {
            if let (Some(ma5), Some(ma20)) = (latest.ma5, latest.ma20) {
                if ma5 > ma20 {
                    rules.insert(Rule::Condition5);
                }
            }
        }

        Evaluation {
            rules,
            gap_pct,
            multiplier_a,
            multiplier_b,
        }
    }

    /// Scan the lookback window from the latest session backward; the first
    /// qualifying session sets the multiplier.
    fn signal_a(&self, series: &[IndicatorBar]) -> Option<f64> {
        let ratio = self.thresholds.breakout_ratio;
        series
            .iter()
            .rev()
            .take(self.thresholds.lookback_days)
            .find_map(|bar| {
                if !bar.is_bullish() {
                    return None;
                }
                volume_ratio(bar, ratio)
            })
    }

    fn signal_b(&self, latest: &IndicatorBar) -> Option<f64> {
        volume_ratio(latest, self.thresholds.surge_ratio)
    }
}

/// `volume / max(vol_ma5, vol_ma10)` when volume clears `ratio` times both
/// averages. Missing or zero averages never qualify.
fn volume_ratio(bar: &IndicatorBar, ratio: f64) -> Option<f64> {
    let (ma5, ma10) = (bar.volume_ma5?, bar.volume_ma10?);
    let max_ma = bar.max_volume_ma()?;
    let volume = bar.volume as f64;
    if max_ma <= 0.0 || volume < ma5 * ratio || volume < ma10 * ratio {
        return None;
    }
    Some(volume / max_ma)
}

/// MA10/MA5 gap in percent at a session.
pub fn gap_pct(bar: &IndicatorBar) -> f64 {
    match (bar.ma5, bar.ma10) {
        (Some(ma5), Some(ma10)) if ma5 != 0.0 => (ma10 - ma5) / ma5 * 100.0,
        _ => f64::INFINITY,
    }
}
