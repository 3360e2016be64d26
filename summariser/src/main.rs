use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use cc_tunnel_summariser::{
    summarise, AggregateSettings, DEFAULT_PAYLOAD_SIZE, DEFAULT_REPORT_FILE_NAME,
};
use cc_tunnel_summary_model::load_metadata;
use clap::Parser;

/// Summarise cc-tunnel link logs into a throughput, delay and loss table
#[derive(Parser, Debug)]
#[command(name = "cc-tunnel-summariser", version, about, long_about = None)]
struct SummariserCli {
    /// The data directory the runs were written to
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Schemes to summarise, e.g. `--schemes "cubic bbr"`. Defaults to the schemes in the run
    /// metadata.
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    schemes: Vec<String>,

    /// The run to summarise
    #[arg(long, default_value = "1")]
    run_id: u32,

    /// Bytes counted per sent packet
    #[arg(long, default_value_t = DEFAULT_PAYLOAD_SIZE)]
    payload_size: u64,

    /// Seconds that throughput is averaged over
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    window_secs: u64,

    /// Where to write the CSV report
    #[arg(long, default_value = DEFAULT_REPORT_FILE_NAME)]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = SummariserCli::parse();

    let schemes = if cli.schemes.is_empty() {
        let metadata = load_metadata(&cli.data_dir).with_context(|| {
            format!(
                "No --schemes given and failed to read run metadata from {}",
                cli.data_dir.display()
            )
        })?;
        metadata.schemes
    } else {
        cli.schemes
    };
    log::debug!("Summarising run {} of {schemes:?}", cli.run_id);

    let settings = AggregateSettings {
        payload_size: cli.payload_size,
        window: Duration::from_secs(cli.window_secs),
    };
    let report = summarise(&cli.data_dir, &schemes, cli.run_id, &settings);

    println!("{}", report.to_table());
    report
        .write_csv(&cli.output)
        .with_context(|| format!("Failed to write report to {}", cli.output.display()))?;
    log::info!("Wrote report to {}", cli.output.display());

    Ok(())
}
