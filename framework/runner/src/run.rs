use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use cc_tunnel_core::prelude::{
    ExecutionMode, RunSpec, SchemeRegistry, ShutdownHandle, ShutdownListener,
};
use cc_tunnel_summary_model::{
    append_run_record, save_metadata, RunRecord, RunStatus, TestMetadata, RUN_SUMMARY_FILE_NAME,
};
use chrono::Utc;
use rand::seq::SliceRandom;

use crate::cli::{RunArgs, SchemeSelection};
use crate::configure::LaunchSettings;
use crate::error::RunError;
use crate::git::git_summary;
use crate::orchestrator::{run_one, RunOutcome, RunReport};

/// Counts of how the runs of a batch ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.completed + self.timed_out + self.failed
    }
}

/// The schemes to run, in the order they should be run.
pub fn select_schemes(
    registry: &SchemeRegistry,
    selection: &SchemeSelection,
    random_order: bool,
) -> Vec<String> {
    let mut schemes: Vec<String> = if selection.all {
        registry.names().map(str::to_string).collect()
    } else {
        selection.schemes.clone()
    };

    if random_order {
        schemes.shuffle(&mut rand::thread_rng());
    }
    schemes
}

/// Run every selected scheme `run_times` times and record the results in the data directory.
///
/// A failed run is logged and recorded, then the batch moves on to the next run, unless
/// `--fail-fast` was given. An interrupted run always stops the batch.
pub async fn run_tests(
    args: &RunArgs,
    settings: &LaunchSettings,
    shutdown: &ShutdownHandle,
) -> anyhow::Result<BatchSummary> {
    let registry = SchemeRegistry::load(&args.config).with_context(|| {
        format!(
            "Failed to load scheme registry from {}",
            args.config.display()
        )
    })?;
    let mode = args
        .mode
        .to_execution_mode()
        .context("Invalid execution mode")?;
    let schemes = select_schemes(&registry, &args.selection, args.random_order);
    let run_ids = run_ids(args.start_run_id, args.run_times)?;

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            args.data_dir.display()
        )
    })?;
    let data_dir = std::path::absolute(&args.data_dir).context("Failed to resolve data directory")?;

    let metadata = TestMetadata {
        schemes: schemes.clone(),
        mode: mode.clone(),
        run_times: args.run_times,
        start_run_id: args.start_run_id,
        timeout_secs: args.timeout,
        random_order: args.random_order,
        started_at: Utc::now(),
        harness_version: env!("CARGO_PKG_VERSION").to_string(),
        git: git_summary(&registry_dir(&args.config)),
    };
    let metadata_path = save_metadata(&metadata, &data_dir).context("Failed to write metadata")?;
    log::debug!("Wrote metadata to {}", metadata_path.display());

    let records_path = data_dir.join(RUN_SUMMARY_FILE_NAME);
    let mut listener = shutdown.new_listener();
    let mut summary = BatchSummary::default();

    for run_id in run_ids {
        for scheme in &schemes {
            log::info!(
                "Testing scheme {scheme} for experiment run {}/{}",
                run_id - args.start_run_id + 1,
                args.run_times
            );

            let result = run_scheme(
                scheme,
                run_id,
                &mode,
                args,
                &data_dir,
                &registry,
                settings,
                &mut listener,
            )
            .await;

            let record = run_record(scheme, run_id, &result);
            append_run_record(&record, &records_path).context("Failed to write run record")?;

            match result {
                Ok(report) => match report.outcome {
                    RunOutcome::Completed => summary.completed += 1,
                    RunOutcome::TimedOut => summary.timed_out += 1,
                },
                Err(RunError::Interrupted) => {
                    anyhow::bail!("Interrupted during run {run_id} of {scheme}");
                }
                Err(e) => {
                    summary.failed += 1;
                    log::error!("Run {run_id} of {scheme} failed: {e}");
                    if args.fail_fast {
                        return Err(anyhow::Error::new(e)
                            .context(format!("Run {run_id} of {scheme} failed")));
                    }
                }
            }
        }
    }

    Ok(summary)
}

/// The run ids of a batch, `run_times` of them counting up from `start_run_id`.
pub fn run_ids(start_run_id: u32, run_times: u32) -> anyhow::Result<impl Iterator<Item = u32>> {
    let Some(last) = start_run_id.checked_add(run_times.saturating_sub(1)) else {
        anyhow::bail!("{run_times} runs starting at run id {start_run_id} overflow the run id");
    };
    Ok((start_run_id..=last).take(run_times as usize))
}

#[allow(clippy::too_many_arguments)]
async fn run_scheme(
    scheme: &str,
    run_id: u32,
    mode: &ExecutionMode,
    args: &RunArgs,
    data_dir: &Path,
    registry: &SchemeRegistry,
    settings: &LaunchSettings,
    listener: &mut ShutdownListener,
) -> Result<RunReport, RunError> {
    let descriptor = registry.validate(scheme)?;
    let run_order = descriptor.resolve_run_order()?;
    log::debug!(
        "{} runs the {} first",
        descriptor.display_name(),
        run_order.first
    );

    let spec = RunSpec::new(
        scheme,
        run_id,
        mode.clone(),
        run_order,
        Duration::from_secs(args.timeout),
        data_dir,
    );
    run_one(&spec, registry, settings, listener, !args.no_progress).await
}

fn run_record(scheme: &str, run_id: u32, result: &Result<RunReport, RunError>) -> RunRecord {
    match result {
        Ok(report) => RunRecord {
            scheme: scheme.to_string(),
            run_id,
            started_at: Some(report.started_at),
            ended_at: report.ended_at,
            status: match report.outcome {
                RunOutcome::Completed => RunStatus::Completed,
                RunOutcome::TimedOut => RunStatus::TimedOut,
            },
        },
        Err(e) => RunRecord {
            scheme: scheme.to_string(),
            run_id,
            started_at: None,
            ended_at: Utc::now(),
            status: RunStatus::Failed {
                error: e.to_string(),
            },
        },
    }
}

/// The directory holding the scheme registry, which is the root of the harness checkout.
pub fn registry_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Where the emergency sweep looks for processes when no directory is given.
pub fn default_kill_dir(config: &Path) -> PathBuf {
    match SchemeRegistry::load(config) {
        Ok(registry) => registry.wrappers_dir().to_path_buf(),
        Err(e) => {
            log::warn!(
                "Failed to load scheme registry from {}, assuming default wrappers dir: {e}",
                config.display()
            );
            registry_dir(config).join("wrappers")
        }
    }
}
