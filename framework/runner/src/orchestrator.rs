use std::time::Duration;

use cc_tunnel_core::prelude::{RunSpec, SchemeRegistry, ShutdownListener, Side};
use chrono::{DateTime, Utc};

use crate::configure::{configure, LaunchSettings, ResolvedRun};
use crate::error::RunError;
use crate::port::free_port;
use crate::process::ProcessGroup;
use crate::progress::start_progress;

/// How a run ended, when it ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum RunOutcome {
    /// Both endpoints exited successfully before the time limit.
    #[display("completed")]
    Completed,
    /// The time limit was reached while an endpoint was still running.
    #[display("timed out")]
    TimedOut,
}

/// The result of a run that ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// A run whose endpoints have both been started.
///
/// Owns both process groups. They are signalled by [`LaunchedRun::cleanup`], or when the
/// [`LaunchedRun`] is dropped if cleanup was never reached.
#[derive(Debug)]
pub struct LaunchedRun {
    resolved: ResolvedRun,
    first: ProcessGroup,
    second: ProcessGroup,
    started_at: DateTime<Utc>,
}

/// Start the first endpoint, give it time to listen, then start the second.
pub async fn launch(resolved: ResolvedRun) -> Result<LaunchedRun, RunError> {
    let scheme = resolved.spec.scheme().to_string();
    let port = free_port()?;

    log::info!("Running {scheme} {}", resolved.first.side);
    let first_command = resolved.first.to_launch_command(port);
    let mut first = ProcessGroup::spawn(resolved.first.side, &first_command).map_err(|source| {
        RunError::Spawn {
            side: resolved.first.side,
            source,
        }
    })?;

    tokio::time::sleep(resolved.settle).await;
    let started_at = Utc::now();

    log::info!("Running {scheme} {}", resolved.second.side);
    let second_command = resolved.second.to_launch_command(port);
    let second = match ProcessGroup::spawn(resolved.second.side, &second_command) {
        Ok(second) => second,
        Err(source) => {
            first.terminate(resolved.kill_grace).await;
            return Err(RunError::Spawn {
                side: resolved.second.side,
                source,
            });
        }
    };

    Ok(LaunchedRun {
        resolved,
        first,
        second,
        started_at,
    })
}

impl LaunchedRun {
    pub fn spec(&self) -> &RunSpec {
        &self.resolved.spec
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn pids(&self) -> (u32, u32) {
        (self.first.pid(), self.second.pid())
    }

    /// Wait for both endpoints to exit, for at most `timeout`.
    ///
    /// Reaching the time limit is the normal way for many schemes to end, so it is reported as
    /// [`RunOutcome::TimedOut`] rather than as an error. The endpoints are not stopped here, call
    /// [`LaunchedRun::cleanup`] afterwards.
    pub async fn await_exit(
        &mut self,
        timeout: Duration,
        shutdown: &mut ShutdownListener,
    ) -> Result<RunReport, RunError> {
        let result = tokio::select! {
            waited = tokio::time::timeout(timeout, wait_both(&mut self.first, &mut self.second)) => {
                match waited {
                    Ok(Ok(())) => {
                        log::warn!("Test exited before time limit");
                        Ok(RunOutcome::Completed)
                    }
                    Ok(Err(e)) => Err(e),
                    Err(_) => {
                        log::warn!(
                            "Time limit of {}s reached for {}, stopping endpoints",
                            timeout.as_secs(),
                            self.spec().scheme()
                        );
                        Ok(RunOutcome::TimedOut)
                    }
                }
            }
            _ = shutdown.wait_for_shutdown() => Err(RunError::Interrupted),
        };

        let ended_at = Utc::now();
        result.map(|outcome| RunReport {
            outcome,
            started_at: self.started_at,
            ended_at,
        })
    }

    /// Stop both process groups, second endpoint first.
    pub async fn cleanup(mut self) {
        let grace = self.resolved.kill_grace;
        log::debug!("Cleaning up run of {}", self.resolved.spec.scheme());
        self.second.terminate(grace).await;
        self.first.terminate(grace).await;
    }
}

async fn wait_both(first: &mut ProcessGroup, second: &mut ProcessGroup) -> Result<(), RunError> {
    let mut first_done = false;
    let mut second_done = false;

    while !(first_done && second_done) {
        tokio::select! {
            status = first.wait(), if !first_done => {
                check_exit(first.side(), status?)?;
                first_done = true;
            }
            status = second.wait(), if !second_done => {
                check_exit(second.side(), status?)?;
                second_done = true;
            }
        }
    }

    Ok(())
}

fn check_exit(side: Side, status: std::process::ExitStatus) -> Result<(), RunError> {
    if status.success() {
        log::debug!("The {side} exited successfully");
        Ok(())
    } else {
        Err(RunError::ProcessFailure { side, status })
    }
}

/// Configure, launch and wait for a single run, then clean it up.
///
/// Once launched, both endpoints are always cleaned up before this returns, whatever the result.
pub async fn run_one(
    spec: &RunSpec,
    registry: &SchemeRegistry,
    settings: &LaunchSettings,
    shutdown: &mut ShutdownListener,
    show_progress: bool,
) -> Result<RunReport, RunError> {
    let resolved = configure(spec, registry, settings)?;
    let mut launched = tokio::select! {
        launched = launch(resolved) => launched?,
        _ = shutdown.wait_for_shutdown() => return Err(RunError::Interrupted),
    };
    let (first_pid, second_pid) = launched.pids();
    log::debug!("Endpoint process groups: {first_pid} and {second_pid}");

    let progress = show_progress.then(|| start_progress(spec.scheme(), spec.timeout()));
    let result = launched.await_exit(spec.timeout(), shutdown).await;
    drop(progress);

    launched.cleanup().await;
    result
}
