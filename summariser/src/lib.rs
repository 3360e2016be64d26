//! Turns the link logs written by `cc-tunnel` into per-scheme throughput, delay and loss.

use std::path::Path;

mod aggregate;
mod event;
mod parse;
mod report;

pub use aggregate::{
    aggregate, summarise_scheme, AggregateSettings, SchemeMetrics, DEFAULT_PAYLOAD_SIZE,
    DEFAULT_WINDOW,
};
pub use event::{EventKind, LogEvent};
pub use parse::{parse, parse_reader, LogEvents, ParseError};
pub use report::{
    Report, ReportError, DEFAULT_REPORT_FILE_NAME, LOSS_COLUMN, RTT_COLUMN, SCHEME_COLUMN,
    THROUGHPUT_COLUMN,
};

/// Summarise one run of each scheme into a [`Report`], keeping the order of `schemes`.
pub fn summarise(
    data_dir: &Path,
    schemes: &[String],
    run_id: u32,
    settings: &AggregateSettings,
) -> Report {
    Report::new(schemes.iter().map(|scheme| {
        let metrics = summarise_scheme(data_dir, scheme, run_id, settings);
        (scheme.clone(), metrics)
    }))
}
