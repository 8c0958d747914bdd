//! Calendar helpers: screening period selection, ROC dates, trading days.

use chrono::{Datelike, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tpex_common::{Error, Result};

/// Offset between ROC (民國) years and Gregorian years.
const ROC_YEAR_OFFSET: i32 = 1911;

/// The year/month a screening run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScreeningPeriod {
    pub year: i32,
    pub month: u32,
}

impl ScreeningPeriod {
    /// Create a period, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// The period containing today's local date.
    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// The calendar month immediately before this one.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// Last weekday of the month; sessions after it are ignored.
    pub fn last_trading_day(&self) -> NaiveDate {
        last_trading_day(self.year, self.month)
    }

    /// Tag used in output file names, e.g. `2024_05`.
    pub fn file_tag(&self) -> String {
        format!("{}_{:02}", self.year, self.month)
    }
}

impl fmt::Display for ScreeningPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", self.year, self.month)
    }
}

impl FromStr for ScreeningPeriod {
    type Err = Error;

    /// Parse `YYYY/MM` (or `YYYY-MM`).
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("expected YYYY/MM, got {:?}", s));

        let (year, month) = s
            .trim()
            .split_once(['/', '-'])
            .ok_or_else(invalid)?;
        let year: i32 = year.trim().parse().map_err(|_| invalid())?;
        let month: u32 = month.trim().parse().map_err(|_| invalid())?;

        Self::new(year, month)
    }
}

/// Last calendar day of the month, stepped back over the weekend.
///
/// Exchange holidays are not considered.
pub fn last_trading_day(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let mut day = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX);

    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    day
}

/// Convert an ROC date string (`113/05/20`) to a Gregorian date.
///
/// Returns `None` for anything that is not a valid `yyy/mm/dd` date.
pub fn parse_roc_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split('/');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let day: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year + ROC_YEAR_OFFSET, month, day)
}
