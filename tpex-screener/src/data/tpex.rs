//! TPEx adapter for the OTC roster and monthly trading history.
//!
//! # Endpoints
//! - Roster: `/www/zh-tw/afterTrading/dailyMarktVal` (market value ranking)
//! - History: `/www/zh-tw/afterTrading/tradingStock` (one month per request)
//!
//! Both endpoints answer with a `tables` array whose first entry carries
//! `fields` (column titles) and `data` (rows of cells). Cells are strings
//! with thousands separators; dates use the ROC calendar.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use tpex_common::DataSourceConfig;

use super::calendar::parse_roc_date;
use super::provider::{MarketDataProvider, ProviderError};
use super::{DailyBar, Instrument};

// ============================================================================
// Constants
// ============================================================================

const ROSTER_PATH: &str = "/www/zh-tw/afterTrading/dailyMarktVal";
const HISTORY_PATH: &str = "/www/zh-tw/afterTrading/tradingStock";

const COL_STOCK_ID: &str = "股票代號";
const COL_STOCK_NAME: &str = "股票名稱";
const COL_DATE: &str = "日 期";
const COL_CLOSE: &str = "收盤";
const COL_OPEN: &str = "開盤";
const COL_VOLUME: &str = "成交張數";

// ============================================================================
// TPEx Adapter
// ============================================================================

/// HTTP adapter for the Taipei Exchange website.
pub struct TpexAdapter {
    /// HTTP client (carries the per-request timeout)
    client: reqwest::Client,
    /// Site root, e.g. `https://www.tpex.org.tw`
    base_url: String,
}

impl TpexAdapter {
    /// Create an adapter against a base URL with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from config
    pub fn from_config(config: &DataSourceConfig) -> Self {
        Self::new(
            config.tpex_base_url.clone(),
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )
    }

    async fn get_tables(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<TpexResponse, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Fetching TPEx table");

        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", response.status())));
        }

        let body: TpexResponse = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl MarketDataProvider for TpexAdapter {
    fn name(&self) -> &'static str {
        "tpex"
    }

    async fn fetch_roster(&self) -> Result<Vec<Instrument>, ProviderError> {
        let response = self.get_tables(ROSTER_PATH, &[]).await?;

        info!(
            date = response.date.as_deref().unwrap_or("-"),
            total = %response.total_count.as_ref().map(cell_text).unwrap_or_default(),
            "Roster response received"
        );

        let table = response
            .tables
            .first()
            .ok_or_else(|| ProviderError::InvalidResponse("roster has no tables".into()))?;

        parse_roster_table(table)
    }

    async fn fetch_monthly_history(
        &self,
        instrument_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let query = [
            ("response", String::new()),
            ("date", format!("{}/{:02}/01", year, month)),
            ("code", instrument_id.to_string()),
        ];
        let response = self.get_tables(HISTORY_PATH, &query).await?;

        let stat = response.stat.as_deref().unwrap_or("");
        if stat != "ok" {
            return Err(ProviderError::InvalidResponse(format!(
                "stat={} ({}/{:02})",
                stat, year, month
            )));
        }

        let table = response.tables.first().ok_or_else(|| {
            ProviderError::DataNotAvailable(format!("no table ({}/{:02})", year, month))
        })?;

        let bars = parse_history_table(table)?;
        if bars.is_empty() {
            return Err(ProviderError::DataNotAvailable(format!(
                "no usable rows ({}/{:02})",
                year, month
            )));
        }
        Ok(bars)
    }
}

// ============================================================================
// Table Parsing
// ============================================================================

/// Turn the roster table into instruments, skipping rows without an id.
fn parse_roster_table(table: &TpexTable) -> Result<Vec<Instrument>, ProviderError> {
    let id_col = table.require_column(COL_STOCK_ID)?;
    let name_col = table.require_column(COL_STOCK_NAME)?;

    let instruments = table
        .data
        .iter()
        .filter_map(|row| {
            let id = row.get(id_col).map(cell_text)?;
            if id.is_empty() {
                return None;
            }
            let name = row.get(name_col).map(cell_text).unwrap_or_default();
            Some(Instrument::new(id, name))
        })
        .collect();

    Ok(instruments)
}

/// Turn a monthly history table into bars sorted by date.
///
/// Rows where any of date/open/close/volume fails to parse are dropped.
fn parse_history_table(table: &TpexTable) -> Result<Vec<DailyBar>, ProviderError> {
    let date_col = table.require_column(COL_DATE)?;
    let close_col = table.require_column(COL_CLOSE)?;
    let open_col = table.require_column(COL_OPEN)?;
    let volume_col = table.require_column(COL_VOLUME)?;

    let mut bars: Vec<DailyBar> = table
        .data
        .iter()
        .filter_map(|row| {
            let date = parse_roc_date(&cell_text(row.get(date_col)?))?;
            let close = parse_decimal(&cell_text(row.get(close_col)?))?;
            let open = parse_decimal(&cell_text(row.get(open_col)?))?;
            let volume = parse_lots(&cell_text(row.get(volume_col)?))?;
            Some(DailyBar { date, open, close, volume })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

/// Render a JSON cell as trimmed text.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a price such as `1,234.50`; placeholders like `--` yield `None`.
fn parse_decimal(s: &str) -> Option<f64> {
    let cleaned = s.replace(',', "");
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a lot count such as `12,345`.
fn parse_lots(s: &str) -> Option<u64> {
    let cleaned = s.replace(',', "");
    let cleaned = cleaned.trim();
    cleaned.parse::<u64>().ok().or_else(|| {
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    })
}

// ============================================================================
// TPEx API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TpexResponse {
    /// "ok" on success (history endpoint only)
    #[serde(default)]
    stat: Option<String>,
    /// Data date (roster endpoint only)
    #[serde(default)]
    date: Option<String>,
    #[serde(default, rename = "totalCount")]
    total_count: Option<Value>,
    #[serde(default)]
    tables: Vec<TpexTable>,
}

#[derive(Debug, Deserialize)]
struct TpexTable {
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

impl TpexTable {
    fn require_column(&self, name: &str) -> Result<usize, ProviderError> {
        self.fields
            .iter()
            .position(|f| f.trim() == name)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "missing column {} in {:?}",
                    name, self.fields
                ))
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn history_table(rows: Vec<Value>) -> TpexTable {
        serde_json::from_value(json!({
            "fields": ["日 期", "成交張數", "成交仟元", "開盤", "最高", "最低", "收盤", "漲跌", "筆數"],
            "data": rows,
        }))
        .unwrap()
    }

    fn adapter(server: &MockServer) -> TpexAdapter {
        TpexAdapter::new(server.uri(), Duration::from_secs(5), "Mozilla/5.0")
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_decimal("1,234.50"), Some(1234.5));
        assert_eq!(parse_decimal("--"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_lots("12,345"), Some(12345));
        assert_eq!(parse_lots("200.0"), Some(200));
        assert_eq!(parse_lots("-5"), None);
    }

    #[test]
    fn test_parse_history_drops_bad_rows_and_sorts() {
        let table = history_table(vec![
            json!(["113/05/21", "1,500", "0", "101.00", "0", "0", "103.50", "0", "0"]),
            json!(["113/05/20", "1,200", "0", "100.00", "0", "0", "101.00", "0", "0"]),
            json!(["113/05/22", "900", "0", "--", "0", "0", "102.00", "0", "0"]),
            json!(["bad date", "900", "0", "100.00", "0", "0", "102.00", "0", "0"]),
        ]);

        let bars = parse_history_table(&table).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
        assert_eq!(bars[0].volume, 1200);
        assert_eq!(bars[1].close, 103.5);
        assert_eq!(bars[1].open, 101.0);
    }

    #[test]
    fn test_parse_history_missing_column() {
        let table: TpexTable = serde_json::from_value(json!({
            "fields": ["日 期", "收盤"],
            "data": [],
        }))
        .unwrap();
        assert!(matches!(
            parse_history_table(&table),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_roster_skips_empty_ids() {
        let table: TpexTable = serde_json::from_value(json!({
            "fields": ["排名", "股票代號", "股票名稱", "市值(百萬)"],
            "data": [
                ["1", "6488", "環球晶", "300,000"],
                ["2", "", "無代號", "1"],
                ["3", null, "空值", "1"],
                ["4", "5347", "世界", "150,000"],
            ],
        }))
        .unwrap();

        let roster = parse_roster_table(&table).unwrap();
        assert_eq!(
            roster,
            vec![Instrument::new("6488", "環球晶"), Instrument::new("5347", "世界")]
        );
    }

    #[tokio::test]
    async fn test_fetch_roster() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ROSTER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "date": "20240531",
                "totalCount": 2,
                "tables": [{
                    "fields": ["股票代號", "股票名稱"],
                    "data": [["6488", "環球晶"], ["5347", "世界"]],
                }],
            })))
            .mount(&server)
            .await;

        let roster = adapter(&server).fetch_roster().await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].display_name, "世界");
    }

    #[tokio::test]
    async fn test_fetch_roster_without_tables_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ROSTER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tables": [] })))
            .mount(&server)
            .await;

        let err = adapter(&server).fetch_roster().await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_monthly_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .and(query_param("date", "2024/05/01"))
            .and(query_param("code", "6488"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stat": "ok",
                "tables": [{
                    "fields": ["日 期", "成交張數", "開盤", "收盤"],
                    "data": [
                        ["113/05/02", "2,000", "500.00", "505.00"],
                        ["113/05/03", "1,000", "505.00", "503.00"],
                    ],
                }],
            })))
            .mount(&server)
            .await;

        let bars = adapter(&server)
            .fetch_monthly_history("6488", 2024, 5)
            .await
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].volume, 2000);
        assert_eq!(bars[1].close, 503.0);
    }

    #[tokio::test]
    async fn test_fetch_monthly_history_bad_stat() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stat": "查無資料",
                "tables": [],
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .fetch_monthly_history("0000", 2024, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_monthly_history_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .fetch_monthly_history("6488", 2024, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert!(err.is_recoverable());
    }
}
