use anyhow::Context;
use cc_tunnel_core::prelude::{SchemeRegistry, ShutdownHandle, WrapperCommand};
use cc_tunnel_runner::cli::{Command, RunArgs, SchemeSelection};
use cc_tunnel_runner::prelude::*;

fn main() -> anyhow::Result<()> {
    let cli = cc_tunnel_runner::init();

    match cli.command {
        // Replaces this process, so it must happen before any runtime threads are started.
        Command::Endpoint(args) => Err(exec_endpoint(&args)),
        Command::Run(args) => {
            let runtime =
                tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            runtime.block_on(run(args))
        }
        Command::Cleanup(args) => {
            let kill_dir = args
                .kill_dir
                .unwrap_or_else(|| default_kill_dir(&args.config));
            sweep(&kill_dir);
            Ok(())
        }
        Command::Setup(args) => {
            let command = if args.after_reboot {
                WrapperCommand::SetupAfterReboot
            } else {
                WrapperCommand::Setup
            };
            for_each_scheme(&args.config, &args.selection, command)
        }
        Command::Deps(args) => for_each_scheme(&args.config, &args.selection, WrapperCommand::Deps),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let shutdown = ShutdownHandle::new();
    shutdown.shutdown_on_ctrl_c();

    let settings = LaunchSettings::from_current_exe()
        .context("Failed to locate the cc-tunnel executable")?
        .with_settle(std::time::Duration::from_millis(args.settle_ms));

    match run_tests(&args, &settings, &shutdown).await {
        Ok(summary) => {
            log::info!(
                "Finished {} runs: {} completed, {} timed out, {} failed",
                summary.total(),
                summary.completed,
                summary.timed_out,
                summary.failed
            );
            Ok(())
        }
        Err(e) => {
            if args.pkill_cleanup {
                sweep(&default_kill_dir(&args.config));
            }
            Err(e)
        }
    }
}

fn for_each_scheme(
    config: &std::path::Path,
    selection: &SchemeSelection,
    command: WrapperCommand,
) -> anyhow::Result<()> {
    let registry = SchemeRegistry::load(config).with_context(|| {
        format!("Failed to load scheme registry from {}", config.display())
    })?;

    for scheme in select_schemes(&registry, selection, false) {
        let descriptor = registry.get(&scheme)?;
        run_wrapper_command(descriptor, command)?;
    }

    Ok(())
}
