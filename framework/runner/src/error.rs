use std::process::ExitStatus;

use cc_tunnel_core::prelude::{ConfigError, Side};

/// Why a single run did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to start the {side}: {source}")]
    Spawn {
        side: Side,
        #[source]
        source: std::io::Error,
    },

    #[error("The {side} exited before the time limit with {status}")]
    ProcessFailure { side: Side, status: ExitStatus },

    #[error("The run was interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
