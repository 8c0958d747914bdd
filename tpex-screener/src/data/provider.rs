//! Data provider abstraction for the screener's upstream collaborators.
//!
//! The screening core only sees these traits, so it can be exercised with
//! in-memory providers and never touches the network directly.

use async_trait::async_trait;
use std::fmt;

use super::{DailyBar, IndustryInfo, Instrument};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, HTTP status)
    Network(String),
    /// Request exceeded its timeout
    Timeout(String),
    /// Upstream answered but had nothing usable for the request
    DataNotAvailable(String),
    /// Upstream answered with a body we could not interpret
    InvalidResponse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is transient (a later run may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Source of the instrument universe and its daily history.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get the provider name (e.g., "tpex")
    fn name(&self) -> &'static str;

    /// Fetch the full list of tradable instruments. Called once per run.
    async fn fetch_roster(&self) -> Result<Vec<Instrument>, ProviderError>;

    /// Fetch one calendar month of daily bars for an instrument.
    ///
    /// Rows with missing or unparsable fields are dropped by the provider;
    /// the returned bars are sorted by date ascending.
    async fn fetch_monthly_history(
        &self,
        instrument_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<DailyBar>, ProviderError>;
}

/// Best-effort industry enrichment.
///
/// Implementations never fail: any error degrades to [`IndustryInfo::unknown`].
#[async_trait]
pub trait IndustryLookup: Send + Sync {
    async fn fetch_industry(&self, instrument_id: &str) -> IndustryInfo;
}

// ============================================================================
// Tests
// ============================================================================
