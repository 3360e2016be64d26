use std::os::unix::process::CommandExt as _;
use std::process::Command;

use anyhow::{bail, Context};

use crate::cli::EndpointArgs;

/// Replace argument `peer_arg` of `command` (not counting the program) with the peer address.
pub fn endpoint_argv(
    command: &[String],
    peer_arg: usize,
    peer_addr: &str,
) -> anyhow::Result<Vec<String>> {
    if command.is_empty() {
        bail!("No endpoint command given");
    }
    let index = peer_arg + 1;
    if index >= command.len() {
        bail!(
            "Peer argument index {peer_arg} is out of range for a command with {} arguments",
            command.len() - 1
        );
    }

    let mut argv = command.to_vec();
    argv[index] = peer_addr.to_string();
    Ok(argv)
}

/// Start the endpoint in place of this process. Only returns if that fails.
pub fn exec_endpoint(args: &EndpointArgs) -> anyhow::Error {
    match prepare(args) {
        Ok(mut command) => {
            let e = command.exec();
            anyhow::Error::new(e).context("Failed to exec endpoint")
        }
        Err(e) => e,
    }
}

fn prepare(args: &EndpointArgs) -> anyhow::Result<Command> {
    let peer_addr = std::env::var(&args.peer_env)
        .with_context(|| format!("Peer address variable '{}' is not set", args.peer_env))?;
    let argv = endpoint_argv(&args.command, args.peer_arg, &peer_addr)?;
    log::debug!("Starting endpoint: {}", argv.join(" "));

    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]);
    Ok(command)
}
