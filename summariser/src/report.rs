use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::aggregate::SchemeMetrics;

pub const SCHEME_COLUMN: &str = "Scheme";
pub const THROUGHPUT_COLUMN: &str = "Uplink Throughput (Mbps)";
pub const RTT_COLUMN: &str = "Avg RTT (ms)";
pub const LOSS_COLUMN: &str = "Loss Rate (%)";

/// Default file name of the CSV report.
pub const DEFAULT_REPORT_FILE_NAME: &str = "throughput_data.csv";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build report: {0}")]
    Polars(#[from] PolarsError),
}

/// One row per scheme, in the order the schemes were run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    rows: Vec<(String, Option<SchemeMetrics>)>,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Scheme")]
    scheme: String,
    #[tabled(rename = "Uplink Throughput (Mbps)", display = "optional_float")]
    throughput_mbps: Option<f64>,
    #[tabled(rename = "Avg RTT (ms)", display = "optional_float")]
    avg_rtt_ms: Option<f64>,
    #[tabled(rename = "Loss Rate (%)", display = "optional_float")]
    loss_rate_pct: Option<f64>,
}

fn optional_float(n: &Option<f64>) -> String {
    n.map(|n| format!("{:.2}", n)).unwrap_or_default()
}

impl Report {
    /// Scheme names are shown upper-cased.
    pub fn new(rows: impl IntoIterator<Item = (String, Option<SchemeMetrics>)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(scheme, metrics)| (scheme.to_uppercase(), metrics))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_table(&self) -> String {
        let rows = self.rows.iter().map(|(scheme, metrics)| ReportRow {
            scheme: scheme.clone(),
            throughput_mbps: metrics.map(|m| m.throughput_mbps()),
            avg_rtt_ms: metrics.map(|m| m.avg_rtt_ms),
            loss_rate_pct: metrics.map(|m| m.loss_rate_pct),
        });

        let mut table = Table::new(rows);
        table.with(Style::modern());
        table.to_string()
    }

    /// The report as a frame with one nullable column per metric.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let schemes: Vec<&str> = self.rows.iter().map(|(s, _)| s.as_str()).collect();
        let metric = |f: fn(&SchemeMetrics) -> f64| -> Vec<Option<f64>> {
            self.rows.iter().map(|(_, m)| m.as_ref().map(f)).collect()
        };

        df!(
            SCHEME_COLUMN => schemes,
            THROUGHPUT_COLUMN => metric(|m| m.throughput_mbps()),
            RTT_COLUMN => metric(|m| m.avg_rtt_ms),
            LOSS_COLUMN => metric(|m| m.loss_rate_pct)
        )
    }

    /// Write the report as CSV. Absent metrics are written as empty cells.
    pub fn write_csv(&self, path: &Path) -> Result<(), ReportError> {
        let mut frame = self.to_frame()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn cubic() -> SchemeMetrics {
        SchemeMetrics {
            throughput_bps: 12_500_000.0,
            avg_rtt_ms: 60.0,
            loss_rate_pct: 0.5,
            sent: 100,
            acked: 99,
        }
    }

    fn report() -> Report {
        Report::new(vec![
            ("cubic".to_string(), Some(cubic())),
            ("bbr".to_string(), None),
        ])
    }

    #[test]
    fn table_shows_absent_metrics_as_blank() {
        let table = report().to_table();
        assert!(table.contains("Uplink Throughput (Mbps)"));
        assert!(table.contains("CUBIC"));
        assert!(table.contains("12.50"));
        assert!(table.contains("60.00"));
        assert!(table.contains("0.50"));

        let bbr_line = table.lines().find(|l| l.contains("BBR")).unwrap();
        assert!(!bbr_line.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn frame_keeps_row_order_and_nulls() {
        let frame = report().to_frame().unwrap();
        let names: Vec<&str> = frame
            .get_column_names()
            .iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![SCHEME_COLUMN, THROUGHPUT_COLUMN, RTT_COLUMN, LOSS_COLUMN]
        );
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.column(RTT_COLUMN).unwrap().null_count(), 1);
    }

    #[test]
    fn csv_has_header_and_empty_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_REPORT_FILE_NAME);
        report().write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "Scheme,Uplink Throughput (Mbps),Avg RTT (ms),Loss Rate (%)"
        );
        let cubic: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(cubic[0], "CUBIC");
        let values: Vec<f64> = cubic[1..].iter().map(|v| v.parse().unwrap()).collect();
        assert_eq!(values, vec![12.5, 60.0, 0.5]);
        assert_eq!(lines[2], "BBR,,,");
    }
}
