use std::path::PathBuf;

use crate::scheme::WrapperCommand;

/// Problems found while resolving a run's configuration.
///
/// A [`ConfigError`] is always raised before any endpoint process is spawned, so there is never
/// anything to clean up when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Scheme '{0}' is not declared in the scheme registry")]
    UnknownScheme(String),

    #[error("Wrapper for scheme '{scheme}' not found at '{}'", path.display())]
    MissingWrapper { scheme: String, path: PathBuf },

    #[error("Wrapper for scheme '{scheme}' at '{}' is not executable", path.display())]
    WrapperNotExecutable { scheme: String, path: PathBuf },

    #[error("Wrapper for scheme '{scheme}' does not support the '{command}' command")]
    UnsupportedCommand {
        scheme: String,
        command: WrapperCommand,
    },

    #[error("Trace file not found: '{}'", .0.display())]
    MissingTrace(PathBuf),

    #[error("Link emulator binary not found: {0}")]
    EmulatorNotFound(String),

    #[error("Could not determine which side runs first for scheme '{scheme}': {reason}")]
    InvalidRunOrder { scheme: String, reason: String },

    #[error("Invalid remote path '{0}', expected 'user@host:/base/dir'")]
    InvalidRemotePath(String),

    #[error("Invalid scheme registry: {0}")]
    InvalidRegistry(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
