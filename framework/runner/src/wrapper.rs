use std::process::Command;

use anyhow::{bail, Context};
use cc_tunnel_core::prelude::{SchemeDescriptor, WrapperCommand};

/// Run a maintenance command (`deps`, `setup` or `setup_after_reboot`) of a scheme wrapper.
///
/// The wrapper's output goes straight to the terminal.
pub fn run_wrapper_command(
    descriptor: &SchemeDescriptor,
    command: WrapperCommand,
) -> anyhow::Result<()> {
    descriptor.validate()?;
    descriptor.ensure_supports(command)?;

    log::info!("Running '{command}' for {}", descriptor.display_name());
    let status = Command::new(&descriptor.wrapper)
        .arg(command.as_str())
        .status()
        .with_context(|| format!("Failed to run wrapper for {}", descriptor.name))?;
    if !status.success() {
        bail!(
            "'{command}' for {} failed with exit code: {status}",
            descriptor.name
        );
    }

    Ok(())
}
