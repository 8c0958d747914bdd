//! Market data module for TPEx-listed equities.
//!
//! Provides the instrument roster, monthly daily-bar history and industry
//! enrichment behind async traits, plus the concrete HTTP adapters.
//!
//! # Data Sources
//! - **TPEx** (`www.tpex.org.tw`): roster by market value, monthly trading history
//! - **Industry Value Chain** (`ic.tpex.org.tw`): industry and chain classification

mod calendar;
mod industry;
mod provider;
mod tpex;

pub use calendar::{last_trading_day, parse_roc_date, ScreeningPeriod};
pub use industry::{parse_industry_page, IndustryChainClient};
pub use provider::{IndustryLookup, MarketDataProvider, ProviderError};
pub use tpex::TpexAdapter;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// A tradable instrument from the exchange roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange code (e.g., "6488")
    pub id: String,
    /// Display name (e.g., "環球晶")
    pub display_name: String,
}

impl Instrument {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One trading session for an instrument.
///
/// Volume is in lots (張), the exchange's standard trading unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Session date
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Closing price
    pub close: f64,
    /// Traded volume in lots
    pub volume: u64,
}

/// Sentinel used when industry classification is unavailable.
pub const UNKNOWN_INDUSTRY: &str = "N/A";

/// Free-text industry classification for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryInfo {
    /// Industry names, comma-joined when the company spans several
    pub industry: String,
    /// Position in each industry's value chain, comma-joined
    pub industry_chain: String,
}

impl IndustryInfo {
    /// The "unknown" value returned whenever a lookup fails.
    pub fn unknown() -> Self {
        Self {
            industry: UNKNOWN_INDUSTRY.to_string(),
            industry_chain: UNKNOWN_INDUSTRY.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.industry == UNKNOWN_INDUSTRY && self.industry_chain == UNKNOWN_INDUSTRY
    }
}

impl Default for IndustryInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_industry_sentinel() {
        let info = IndustryInfo::default();
        assert!(info.is_unknown());
        assert_eq!(info.industry, "N/A");
    }
}
