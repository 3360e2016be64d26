use std::path::PathBuf;

use cc_tunnel_core::prelude::{
    ConfigError, ExecutionMode, LinkEmulation, RemoteHost, ServerSide,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cc-tunnel", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run congestion-control schemes and capture their link logs
    Run(RunArgs),
    /// Kill every process started from the wrappers directory, for use after a crashed run
    Cleanup(CleanupArgs),
    /// Run the `setup` command of each selected scheme wrapper
    Setup(SetupArgs),
    /// Print the dependencies of each selected scheme wrapper
    Deps(DepsArgs),
    /// Start an endpoint whose peer address is only known from the environment.
    ///
    /// Used inside the link emulator's shell, where the address of the outside host is set in an
    /// environment variable.
    #[command(hide = true)]
    Endpoint(EndpointArgs),
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SchemeSelection {
    /// Test every scheme in the registry, in the order they are declared
    #[arg(long)]
    pub all: bool,

    /// Test the listed schemes, in the order given. For example `--schemes "cubic bbr"`.
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    pub schemes: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SchemeSelection,

    /// Shuffle the scheme order
    #[arg(long, default_value = "false")]
    pub random_order: bool,

    /// The number of times to run each scheme
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub run_times: u32,

    /// The run id of the first run
    #[arg(long, default_value = "1")]
    pub start_run_id: u32,

    /// The number of seconds each run is allowed to take
    #[arg(long, default_value = "60")]
    pub timeout: u64,

    /// Where logs and run records are written
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Milliseconds to wait after starting the first endpoint before starting the second
    #[arg(long, default_value = "3000")]
    pub settle_ms: u64,

    /// Path to the scheme registry
    #[arg(long, default_value = "schemes.toml")]
    pub config: PathBuf,

    /// Stop the batch at the first failed run instead of moving on to the next one
    #[arg(long, default_value = "false")]
    pub fail_fast: bool,

    /// If the batch fails, kill every process started from the wrappers directory before exiting
    #[arg(long, default_value = "false")]
    pub pkill_cleanup: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[arg(long, default_value = "false")]
    pub no_progress: bool,

    #[command(subcommand)]
    pub mode: ModeArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ModeArgs {
    /// Both endpoints on this host, connected over loopback
    Local,
    /// Both endpoints on this host, the second one behind an emulated link
    Emulated(EmulatedArgs),
    /// One endpoint on this host and one on a remote host reached over ssh
    Remote(RemoteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EmulatedArgs {
    /// Trace file for the data direction of the link
    #[arg(long)]
    pub uplink_trace: PathBuf,

    /// Trace file for the ack direction of the link
    #[arg(long)]
    pub downlink_trace: PathBuf,

    /// Commands to run before the link emulator, e.g. "mm-delay 20"
    #[arg(long, allow_hyphen_values = true)]
    pub prepend_mm_cmds: Option<String>,

    /// Commands to run after the link emulator, e.g. "mm-loss uplink 0.1"
    #[arg(long, allow_hyphen_values = true)]
    pub append_mm_cmds: Option<String>,

    /// Extra arguments for the link emulator
    #[arg(long, allow_hyphen_values = true)]
    pub extra_mm_link_args: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// The remote harness checkout, as `user@host:/base/dir`
    #[arg(long)]
    pub remote_path: String,

    /// This host's address as seen from the remote host
    #[arg(long)]
    pub local_addr: String,

    /// Which host runs the endpoint that listens
    #[arg(long, default_value = "local")]
    pub server_side: ServerSide,
}

impl ModeArgs {
    pub fn to_execution_mode(&self) -> Result<ExecutionMode, ConfigError> {
        match self {
            ModeArgs::Local => Ok(ExecutionMode::Local),
            ModeArgs::Emulated(args) => {
                let mut emulation =
                    LinkEmulation::new(&args.uplink_trace, &args.downlink_trace);
                if let Some(hook) = &args.prepend_mm_cmds {
                    emulation = emulation.with_prepend(hook);
                }
                if let Some(hook) = &args.append_mm_cmds {
                    emulation = emulation.with_append(hook);
                }
                if let Some(hook) = &args.extra_mm_link_args {
                    emulation = emulation.with_extra_link_args(hook);
                }
                Ok(ExecutionMode::Emulated(emulation))
            }
            ModeArgs::Remote(args) => Ok(ExecutionMode::Remote(RemoteHost::parse(
                &args.remote_path,
                args.local_addr.clone(),
                args.server_side,
            )?)),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Kill processes whose executable or command line refers to this directory.
    ///
    /// Defaults to the wrappers directory of the scheme registry.
    #[arg(long)]
    pub kill_dir: Option<PathBuf>,

    /// Path to the scheme registry
    #[arg(long, default_value = "schemes.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    #[command(flatten)]
    pub selection: SchemeSelection,

    /// Run `setup_after_reboot` instead of `setup`
    #[arg(long, default_value = "false")]
    pub after_reboot: bool,

    /// Path to the scheme registry
    #[arg(long, default_value = "schemes.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DepsArgs {
    #[command(flatten)]
    pub selection: SchemeSelection,

    /// Path to the scheme registry
    #[arg(long, default_value = "schemes.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Environment variable holding the peer address
    #[arg(long)]
    pub peer_env: String,

    /// Index of the program argument to replace with the peer address
    #[arg(long)]
    pub peer_arg: usize,

    /// The program to run and its arguments
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}
