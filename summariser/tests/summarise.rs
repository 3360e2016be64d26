use std::path::Path;
use std::process::Command;

use cc_tunnel_core::prelude::{ExecutionMode, LogPaths};
use cc_tunnel_summariser::{summarise, AggregateSettings};
use cc_tunnel_summary_model::{save_metadata, TestMetadata};
use tempfile::TempDir;

const HEADER: &str = "# mm-link [uplink] > /data/cubic_mm_datalink_run1.log\n# init timestamp: 1700000000000\n";

fn write_uplink_log(data_dir: &Path, scheme: &str, run_id: u32, records: &str) {
    let path = LogPaths::new(data_dir, scheme, run_id).mm_datalink;
    std::fs::write(path, format!("{HEADER}{records}")).unwrap();
}

fn write_metadata(data_dir: &Path, schemes: &[&str]) {
    let metadata = TestMetadata {
        schemes: schemes.iter().map(|s| s.to_string()).collect(),
        mode: ExecutionMode::Local,
        run_times: 1,
        start_run_id: 1,
        timeout_secs: 60,
        random_order: false,
        started_at: chrono::Utc::now(),
        harness_version: "0.0.0".to_string(),
        git: None,
    };
    save_metadata(&metadata, data_dir).unwrap();
}

fn summariser() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cc-tunnel-summariser"))
}

#[test]
fn test_should_summarise_selected_run() {
    let dir = TempDir::new().unwrap();
    write_uplink_log(dir.path(), "cubic", 1, "0 + 1500\n1 + 1500\n40 - 1500\n");
    write_uplink_log(dir.path(), "cubic", 2, "0 + 1500\n100 - 1500\n");

    let settings = AggregateSettings::default();
    let first = summarise(dir.path(), &["cubic".to_string()], 1, &settings);
    let second = summarise(dir.path(), &["cubic".to_string()], 2, &settings);

    let frame = first.to_frame().unwrap();
    assert_eq!(frame.height(), 1);
    assert_ne!(first.to_table(), second.to_table());
}

#[test]
fn test_should_write_report_for_metadata_schemes() {
    let dir = TempDir::new().unwrap();
    write_metadata(dir.path(), &["vegas", "cubic", "bbr"]);
    write_uplink_log(dir.path(), "cubic", 1, "0 + 1500\n10 + 1500\n50 - 1500\n70 - 1500\n");
    write_uplink_log(dir.path(), "vegas", 1, "0 + 1500\n20 - 1500\n");
    // bbr has no log at all.

    let output = dir.path().join("report.csv");
    let result = summariser()
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--output")
        .arg(&output)
        .output()
        .unwrap();
    assert!(
        result.status.success(),
        "{}",
        String::from_utf8_lossy(&result.stderr)
    );

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("CUBIC"), "{stdout}");
    assert!(stdout.contains("BBR"), "{stdout}");

    let csv = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4, "{csv}");
    assert!(lines[1].starts_with("VEGAS,"));
    assert!(lines[2].starts_with("CUBIC,"));
    assert_eq!(lines[3], "BBR,,,");

    let cubic: Vec<&str> = lines[2].split(',').collect();
    let rtt: f64 = cubic[2].parse().unwrap();
    let loss: f64 = cubic[3].parse().unwrap();
    assert_eq!(rtt, 55.0);
    assert_eq!(loss, 0.0);
}

#[test]
fn test_should_prefer_given_schemes() {
    let dir = TempDir::new().unwrap();
    write_uplink_log(dir.path(), "copa", 3, "0 + 1000\n10 - 1000\n");

    let output = dir.path().join("out.csv");
    let result = summariser()
        .arg("--data-dir")
        .arg(dir.path())
        .args(["--schemes", "copa", "--run-id", "3", "--payload-size", "1000"])
        .args(["--window-secs", "1", "--output"])
        .arg(&output)
        .output()
        .unwrap();
    assert!(result.status.success());

    let csv = std::fs::read_to_string(&output).unwrap();
    let row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
    assert_eq!(row[0], "COPA");
    // One 1000 byte packet in one second.
    let mbps: f64 = row[1].parse().unwrap();
    assert!((mbps - 0.008).abs() < 1e-9, "{mbps}");
}

#[test]
fn test_should_fail_without_schemes_or_metadata() {
    let dir = TempDir::new().unwrap();
    let result = summariser()
        .arg("--data-dir")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("metadata"));
}
