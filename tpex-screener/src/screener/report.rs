//! Result table output.
//!
//! Matches are split into two tables per period:
//! - `filtered_tpex_stocks_others_YYYY_MM.csv` (rules 1-4 only)
//! - `filtered_tpex_stocks_condition5_YYYY_MM.csv` (volume surge)
//!
//! Files are UTF-8 with a byte order mark so spreadsheet tools pick up the
//! Chinese headers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tpex_common::error::{Result, ResultExt};

use crate::data::ScreeningPeriod;

use super::conditions::rule_labels;
use super::pipeline::ScreeningResult;

const UTF8_BOM: &str = "\u{feff}";

/// Column headers, in output order.
pub const HEADERS: [&str; 7] = [
    "股票代號",
    "股票名稱",
    "當日收盤價",
    "交易量超過5或10最多均量的倍數",
    "符合條件",
    "所屬產業",
    "產業鏈",
];

// ============================================================================
// Partition
// ============================================================================

/// Which result table a match belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Matches without rule 5
    Others,
    /// Matches including rule 5
    Condition5,
}

impl Partition {
    pub fn of(result: &ScreeningResult) -> Self {
        if result.is_surge() {
            Self::Condition5
        } else {
            Self::Others
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Others => "others",
            Self::Condition5 => "condition5",
        }
    }

    /// Line written under the header when the table has no rows.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Others => "無其他符合條件的股票",
            Self::Condition5 => "無符合條件五的股票",
        }
    }

    pub fn file_name(&self, period: &ScreeningPeriod) -> String {
        format!("filtered_tpex_stocks_{}_{}.csv", self.file_stem(), period.file_tag())
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

// ============================================================================
// Report Sink
// ============================================================================

/// Destination for the sorted result tables.
pub trait ReportSink: Send + Sync {
    /// Persist one table; returns where it was written.
    fn write_table(
        &self,
        period: &ScreeningPeriod,
        partition: Partition,
        rows: &[ScreeningResult],
    ) -> Result<String>;
}

/// Writes result tables as CSV files into a directory.
pub struct CsvReportSink {
    dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportSink for CsvReportSink {
    fn write_table(
        &self,
        period: &ScreeningPeriod,
        partition: Partition,
        rows: &[ScreeningResult],
    ) -> Result<String> {
        std::fs::create_dir_all(&self.dir).context(format!(
            "Failed to create output directory {}",
            self.dir.display()
        ))?;

        let path = self.dir.join(partition.file_name(period));
        let table = render_table(partition, rows)
            .context(format!("Failed to render {} table", partition))?;
        std::fs::write(&path, table).context(format!("Failed to write {}", path.display()))?;

        Ok(path.display().to_string())
    }
}

// ============================================================================
// CSV Rendering
// ============================================================================

/// Render a table: BOM, header, then one line per row or the placeholder.
///
/// Fields holding a delimiter, quote or line break are quoted.
pub fn render_table(partition: Partition, rows: &[ScreeningResult]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.as_bytes().to_vec());

    writer.write_record(HEADERS).map_err(std::io::Error::from)?;
    for row in rows {
        let close = format!("{:.2}", row.close_price);
        let multiplier = format!("{:.2}", row.volume_multiplier);
        let labels = rule_labels(&row.rules);
        writer
            .write_record([
                row.instrument.id.as_str(),
                row.instrument.display_name.as_str(),
                close.as_str(),
                multiplier.as_str(),
                labels.as_str(),
                row.industry.as_str(),
                row.industry_chain.as_str(),
            ])
            .map_err(std::io::Error::from)?;
    }

    let mut out = writer.into_inner().map_err(|e| e.into_error())?;
    if rows.is_empty() {
        out.extend_from_slice(partition.placeholder().as_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Instrument;
    use crate::screener::conditions::Rule;
    use std::collections::BTreeSet;

    fn result(id: &str, rules: &[Rule], industry: &str) -> ScreeningResult {
        ScreeningResult {
            instrument: Instrument::new(id, "測試"),
            close_price: 110.0,
            rules: rules.iter().copied().collect::<BTreeSet<_>>(),
            volume_multiplier: 600.0 / 350.0,
            industry: industry.into(),
            industry_chain: "上游".into(),
            ma_gap_pct: 0.5,
        }
    }

    #[test]
    fn test_partition_of() {
        assert_eq!(Partition::of(&result("1", &[Rule::Condition1], "x")), Partition::Others);
        assert_eq!(
            Partition::of(&result("1", &[Rule::Condition1, Rule::Condition5], "x")),
            Partition::Condition5
        );
    }

    #[test]
    fn test_file_names() {
        let period = ScreeningPeriod::new(2024, 5).unwrap();
        assert_eq!(
            Partition::Others.file_name(&period),
            "filtered_tpex_stocks_others_2024_05.csv"
        );
        assert_eq!(
            Partition::Condition5.file_name(&period),
            "filtered_tpex_stocks_condition5_2024_05.csv"
        );
    }

    fn render(partition: Partition, rows: &[ScreeningResult]) -> String {
        String::from_utf8(render_table(partition, rows).unwrap()).unwrap()
    }

    #[test]
    fn test_render_rows_with_quoting() {
        let rows = vec![result("6488", &[Rule::Condition1, Rule::Condition4], "半導體, 太陽能")];
        let csv = render(Partition::Others, &rows);

        assert!(csv.starts_with('\u{feff}'));
        let lines: Vec<&str> = csv.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(
            lines[0],
            "股票代號,股票名稱,當日收盤價,交易量超過5或10最多均量的倍數,符合條件,所屬產業,產業鏈"
        );
        assert_eq!(lines[1], "6488,測試,110.00,1.71,\"條件1, 條件4\",\"半導體, 太陽能\",上游");
        assert!(csv.ends_with("上游\n"));
    }

    #[test]
    fn test_render_empty_table_placeholder() {
        let csv = render(Partition::Condition5, &[]);
        assert!(csv.ends_with("產業鏈\n無符合條件五的股票"));

        let csv = render(Partition::Others, &[]);
        assert!(csv.ends_with("無其他符合條件的股票"));
    }

    #[test]
    fn test_render_escapes_quotes_and_line_breaks() {
        let mut row = result("6488", &[Rule::Condition1], "say \"hi\"");
        row.industry_chain = "上游\n中游".into();
        let csv = render(Partition::Others, &[row]);

        assert!(csv.contains(",\"say \"\"hi\"\"\",\"上游\n中游\"\n"));
    }

    #[test]
    fn test_csv_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvReportSink::new(dir.path().join("out"));
        let period = ScreeningPeriod::new(2024, 5).unwrap();

        let location = sink
            .write_table(&period, Partition::Others, &[result("6488", &[Rule::Condition1], "N/A")])
            .unwrap();

        assert!(location.ends_with("filtered_tpex_stocks_others_2024_05.csv"));
        let bytes = std::fs::read(&location).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("6488,測試,110.00,1.71,條件1,N/A,上游"));
    }
}
