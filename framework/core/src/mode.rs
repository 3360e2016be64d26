use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the two endpoints of a run are connected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecutionMode {
    /// Both endpoints run on this host and talk over loopback.
    Local,
    /// Both endpoints run on this host, the second one inside a trace-driven link emulator.
    Emulated(LinkEmulation),
    /// One endpoint runs on this host and the other on a remote host reached over ssh.
    Remote(RemoteHost),
}

impl ExecutionMode {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionMode::Local => "local",
            ExecutionMode::Emulated(_) => "emulated",
            ExecutionMode::Remote(_) => "remote",
        }
    }
}

/// Link emulator settings for [`ExecutionMode::Emulated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEmulation {
    pub uplink_trace: PathBuf,
    pub downlink_trace: PathBuf,
    /// Arguments placed before the emulator binary, e.g. an outer `mm-delay 20`.
    #[serde(default)]
    pub prepend: Vec<String>,
    /// Arguments placed after the emulator's own arguments, e.g. an inner `mm-loss uplink 0.1`.
    #[serde(default)]
    pub append: Vec<String>,
    /// Extra options passed to the emulator itself.
    #[serde(default)]
    pub extra_link_args: Vec<String>,
}

impl LinkEmulation {
    pub fn new(uplink_trace: impl Into<PathBuf>, downlink_trace: impl Into<PathBuf>) -> Self {
        Self {
            uplink_trace: uplink_trace.into(),
            downlink_trace: downlink_trace.into(),
            prepend: Vec::new(),
            append: Vec::new(),
            extra_link_args: Vec::new(),
        }
    }

    pub fn with_prepend(mut self, hook: &str) -> Self {
        self.prepend = split_hook(hook);
        self
    }

    pub fn with_append(mut self, hook: &str) -> Self {
        self.append = split_hook(hook);
        self
    }

    pub fn with_extra_link_args(mut self, hook: &str) -> Self {
        self.extra_link_args = split_hook(hook);
        self
    }

    /// Both trace files must exist before anything is launched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for trace in [&self.uplink_trace, &self.downlink_trace] {
            if !trace.is_file() {
                return Err(ConfigError::MissingTrace(trace.clone()));
            }
        }
        Ok(())
    }
}

/// Split a hook string on whitespace. No quoting rules apply.
pub fn split_hook(hook: &str) -> Vec<String> {
    hook.split_whitespace().map(str::to_string).collect()
}

/// Which host runs the endpoint that listens.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ServerSide {
    #[default]
    #[display("local")]
    Local,
    #[display("remote")]
    Remote,
}

impl FromStr for ServerSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ServerSide::Local),
            "remote" => Ok(ServerSide::Remote),
            other => Err(format!("expected 'local' or 'remote', got '{other}'")),
        }
    }
}

/// The remote half of [`ExecutionMode::Remote`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHost {
    /// The ssh destination, `user@host`.
    pub destination: String,
    /// The host part of the destination, used as the peer address when the remote side listens.
    pub host: String,
    /// The harness checkout on the remote host.
    pub base_dir: PathBuf,
    /// This host's address as seen from the remote host.
    pub local_addr: String,
    pub server_side: ServerSide,
}

impl RemoteHost {
    /// Parse a `user@host:/base/dir` remote path.
    pub fn parse(
        remote_path: &str,
        local_addr: impl Into<String>,
        server_side: ServerSide,
    ) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRemotePath(remote_path.to_string());

        let (destination, base_dir) = remote_path.split_once(':').ok_or_else(invalid)?;
        let (user, host) = destination.split_once('@').ok_or_else(invalid)?;
        if user.is_empty() || host.is_empty() || base_dir.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            destination: destination.to_string(),
            host: host.to_string(),
            base_dir: PathBuf::from(base_dir),
            local_addr: local_addr.into(),
            server_side,
        })
    }

    /// Where the scheme's wrapper lives on the remote host.
    pub fn wrapper_path(&self, local_wrapper: &Path) -> PathBuf {
        let file_name = local_wrapper
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| local_wrapper.to_path_buf());
        self.base_dir.join("wrappers").join(file_name)
    }
}
