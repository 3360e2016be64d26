use clap::Parser;

use crate::cli::Cli;

/// Initialise logging and parse the command line for the `cc-tunnel` binary.
pub fn init() -> Cli {
    env_logger::init();

    Cli::parse()
}
