//! Runs congestion-control schemes against each other, with or without an emulated link, and
//! records where their link logs were written.

pub mod cli;
mod command;
mod configure;
mod emulator;
mod error;
mod git;
mod init;
mod orchestrator;
mod port;
mod process;
mod progress;
mod run;
mod shim;
mod sweep;
mod wrapper;

pub use init::init;

pub mod prelude {
    pub use crate::command::{
        EndpointArg, EndpointCommand, EndpointLaunch, LaunchCommand, PeerAddr, Placement,
        EMULATOR_PEER_ENV,
    };
    pub use crate::configure::{
        configure, LaunchSettings, ResolvedRun, DEFAULT_KILL_GRACE, DEFAULT_SETTLE,
    };
    pub use crate::emulator::{emulator_argv, mm_link_path, MM_LINK_PATH_ENV};
    pub use crate::error::RunError;
    pub use crate::git::git_summary;
    pub use crate::orchestrator::{launch, run_one, LaunchedRun, RunOutcome, RunReport};
    pub use crate::process::ProcessGroup;
    pub use crate::run::{default_kill_dir, run_ids, run_tests, select_schemes, BatchSummary};
    pub use crate::shim::{endpoint_argv, exec_endpoint};
    pub use crate::sweep::sweep;
    pub use crate::wrapper::run_wrapper_command;
}
