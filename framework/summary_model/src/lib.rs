use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

use cc_tunnel_core::prelude::ExecutionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name of the [`TestMetadata`] written into the data directory.
pub const METADATA_FILE_NAME: &str = "cc_tunnel_metadata.json";

/// File name of the [`RunRecord`] log written into the data directory.
pub const RUN_SUMMARY_FILE_NAME: &str = "run_summary.jsonl";

/// The configuration of a whole test batch
///
/// Written once, before the first run starts. The summariser reads the scheme list from here when
/// it is not given one explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestMetadata {
    /// The schemes that were selected, in the order they were run
    pub schemes: Vec<String>,
    /// How the endpoints were connected
    pub mode: ExecutionMode,
    /// The number of times each scheme is run
    pub run_times: u32,
    /// The run id of the first run
    pub start_run_id: u32,
    /// The time limit for each run, in seconds
    pub timeout_secs: u64,
    /// Whether the scheme order was shuffled
    pub random_order: bool,
    /// When the batch started
    pub started_at: DateTime<Utc>,
    /// The version of the harness
    pub harness_version: String,
    /// The state of the harness checkout, if it is a git checkout
    pub git: Option<GitSummary>,
}

/// The source control state the batch ran from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitSummary {
    /// Output of `git rev-parse HEAD`
    pub commit: String,
    /// Whether the working tree had uncommitted changes
    pub dirty: bool,
}

/// What happened to a single run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    /// Both endpoints exited on their own before the time limit
    Completed,
    /// The time limit was reached and the endpoints were stopped
    TimedOut,
    /// The run could not be configured or an endpoint failed
    Failed { error: String },
}

/// Record of a single run, appended to [`RUN_SUMMARY_FILE_NAME`] once the run has finished
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub scheme: String,
    pub run_id: u32,
    /// When the second endpoint was started
    ///
    /// Not set if the run failed before both endpoints were running.
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub status: RunStatus,
}

/// Write the batch metadata into `data_dir`, replacing any previous metadata
pub fn save_metadata(metadata: &TestMetadata, data_dir: &Path) -> anyhow::Result<PathBuf> {
    let path = data_dir.join(METADATA_FILE_NAME);
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, metadata)?;
    Ok(path)
}

/// Load batch metadata from `data_dir`
pub fn load_metadata(data_dir: &Path) -> anyhow::Result<TestMetadata> {
    let file = std::fs::File::open(data_dir.join(METADATA_FILE_NAME))?;
    let metadata = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(metadata)
}

/// Append a run record to a file
///
/// The record is serialized to JSON on a single line followed by a newline.
pub fn append_run_record(record: &RunRecord, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_record(record, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize a run record to a writer
pub fn store_run_record<W: Write>(record: &RunRecord, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, record)?;
    Ok(())
}

/// Load a single run record from a reader
pub fn load_run_record<R: Read>(reader: R) -> anyhow::Result<RunRecord> {
    let record = serde_json::from_reader(std::io::BufReader::new(reader))?;
    Ok(record)
}

/// Load every run record from a file produced by [append_run_record]
pub fn load_run_records(path: &Path) -> anyhow::Result<Vec<RunRecord>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
