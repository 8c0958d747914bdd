//! Technical indicators over a daily bar series.
//!
//! All functions are pure and deterministic. Positions without enough
//! history yield `None` rather than a partial value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::DailyBar;

/// Default RSI lookback.
pub const RSI_PERIOD: usize = 14;

// ============================================================================
// Rounding
// ============================================================================

/// Round to `digits` decimal places, ties to even.
///
/// Matches the rounding used by the exchange's published averages, so
/// `2.675` style boundaries land the same way on every run.
pub fn round_to(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(digits);
    (value * scale).round_ties_even() / scale
}

// ============================================================================
// Moving Average
// ============================================================================

/// Simple moving average of the trailing `window` values at each position.
///
/// The first `window - 1` positions are `None`; a window of 0 yields all `None`.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            // No running total: each value depends only on its own window
            let sum: f64 = values[i + 1 - window..=i].iter().sum();
            Some(sum / window as f64)
        })
        .collect()
}

// ============================================================================
// RSI
// ============================================================================

/// Relative strength index using Wilder smoothing (`alpha = 1 / period`).
///
/// The recursive average is seeded with the first observation, which has no
/// delta and counts as zero gain and zero loss. Whenever the average loss is
/// zero the RSI is 100. Output is rounded to 2 decimals and always in `0..=100`.
pub fn wilder_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let alpha = 1.0 / period.max(1) as f64;

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut out = Vec::with_capacity(closes.len());

    for (i, close) in closes.iter().enumerate() {
        let delta = if i == 0 { 0.0 } else { close - closes[i - 1] };
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = (1.0 - alpha) * avg_gain + alpha * gain;
            avg_loss = (1.0 - alpha) * avg_loss + alpha * loss;
        }

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        out.push(round_to(rsi, 2));
    }
    out
}

// ============================================================================
// Indicator Series
// ============================================================================

/// A daily bar with its derived indicators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub volume: u64,
    /// 5-day close average, 2 decimals
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    /// 5-day volume average, whole lots
    pub volume_ma5: Option<f64>,
    pub volume_ma10: Option<f64>,
    pub rsi14: f64,
}

impl IndicatorBar {
    /// Close above open (shown red on TPEx charts)
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Larger of the two volume averages, if both exist.
    pub fn max_volume_ma(&self) -> Option<f64> {
        Some(self.volume_ma5?.max(self.volume_ma10?))
    }
}

/// Compute MA5/10/20 of close, MA5/10 of volume and RSI14 for a series.
///
/// `bars` must already be sorted by date with no duplicates.
pub fn compute_indicators(bars: &[DailyBar]) -> Vec<IndicatorBar> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    let round_price = |v: Option<f64>| v.map(|x| round_to(x, 2));
    let round_lots = |v: Option<f64>| v.map(|x| round_to(x, 0));

    let ma5 = moving_average(&closes, 5);
    let ma10 = moving_average(&closes, 10);
    let ma20 = moving_average(&closes, 20);
    let vol_ma5 = moving_average(&volumes, 5);
    let vol_ma10 = moving_average(&volumes, 10);
    let rsi = wilder_rsi(&closes, RSI_PERIOD);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| IndicatorBar {
            date: bar.date,
            open: bar.open,
            close: bar.close,
            volume: bar.volume,
            ma5: round_price(ma5[i]),
            ma10: round_price(ma10[i]),
            ma20: round_price(ma20[i]),
            volume_ma5: round_lots(vol_ma5[i]),
            volume_ma10: round_lots(vol_ma10[i]),
            rsi14: rsi[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| DailyBar {
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.5,
                close,
                volume: 100 * (i as u64 + 1),
            })
            .collect()
    }

    #[test]
    fn test_round_to_ties_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(101.236, 2), 101.24);
        assert!(round_to(f64::INFINITY, 2).is_infinite());
    }

    #[test]
    fn test_moving_average_windows() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ma = moving_average(&values, 3);
        assert_eq!(ma, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);

        assert_eq!(moving_average(&values, 0), vec![None; 5]);
        assert_eq!(moving_average(&values, 6), vec![None; 5]);
        assert_eq!(moving_average(&[], 5), Vec::<Option<f64>>::new());
    }

    #[test]
    fn test_moving_average_ignores_earlier_history() {
        let window = [
            59.35, 58.65, 86.95, 135.55, 67.3, 125.35, 132.8, 118.55, 147.05, 136.9,
        ];
        let mut prefixed = vec![147.85, 138.35];
        prefixed.extend_from_slice(&window);

        let alone = moving_average(&window, 10)[9].map(|v| round_to(v, 2));
        let after_prefix = moving_average(&prefixed, 10)[11].map(|v| round_to(v, 2));
        assert_eq!(alone, Some(106.84));
        assert_eq!(after_prefix, alone);
    }

    #[test]
    fn test_rsi_first_value_is_100() {
        let rsi = wilder_rsi(&[100.0], RSI_PERIOD);
        assert_eq!(rsi, vec![100.0]);
    }

    #[test]
    fn test_rsi_monotonic_rise_is_100() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert!(wilder_rsi(&closes, RSI_PERIOD).iter().all(|&r| r == 100.0));
    }

    #[test]
    fn test_rsi_monotonic_fall_is_0() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let rsi = wilder_rsi(&closes, RSI_PERIOD);
        assert_eq!(rsi[0], 100.0);
        assert!(rsi[1..].iter().all(|&r| r == 0.0));
    }

    #[test]
    fn test_rsi_known_values() {
        // One up day of +1 then one down day of -1, alpha = 1/14
        let rsi = wilder_rsi(&[10.0, 11.0, 10.0], RSI_PERIOD);
        // avg_gain = 13/196, avg_loss = 1/14 -> rs = 13/14 -> 48.148...
        assert_eq!(rsi, vec![100.0, 100.0, 48.15]);
    }

    #[test]
    fn test_rsi_bounded_on_noisy_series() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 50.0 + ((i * 37) % 11) as f64 - 5.0)
            .collect();
        let rsi = wilder_rsi(&closes, RSI_PERIOD);
        assert!(rsi.iter().all(|&r| (0.0..=100.0).contains(&r)));
        assert_eq!(rsi, wilder_rsi(&closes, RSI_PERIOD));
    }

    #[test]
    fn test_compute_indicators() {
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let series = compute_indicators(&bars(&closes));
        assert_eq!(series.len(), 20);

        let first = &series[0];
        assert!(first.ma5.is_none() && first.volume_ma5.is_none());

        let fifth = &series[4];
        assert_eq!(fifth.ma5, Some(3.0));
        assert_eq!(fifth.volume_ma5, Some(300.0));
        assert!(fifth.ma10.is_none());

        let last = series.last().unwrap();
        assert_eq!(last.ma5, Some(18.0));
        assert_eq!(last.ma10, Some(15.5));
        assert_eq!(last.ma20, Some(10.5));
        assert_eq!(last.volume_ma10, Some(1550.0));
        assert_eq!(last.max_volume_ma(), Some(1800.0));
        assert_eq!(last.rsi14, 100.0);
    }

    #[test]
    fn test_volume_average_rounds_to_whole_lots() {
        let mut series = bars(&[10.0; 5]);
        for (bar, volume) in series.iter_mut().zip([200, 201, 201, 201, 200]) {
            bar.volume = volume;
        }
        // 1003 / 5 = 200.6
        assert_eq!(compute_indicators(&series)[4].volume_ma5, Some(201.0));
    }
}
