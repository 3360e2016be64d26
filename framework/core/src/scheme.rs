//! The scheme registry: which congestion-control schemes can be tested and how to drive them.
//!
//! Each scheme is driven through a wrapper executable that understands a fixed set of
//! sub-commands ([`WrapperCommand`]). The registry is read from a TOML file such as:
//!
//! ```toml
//! wrappers_dir = "wrappers"
//!
//! [[scheme]]
//! name = "cubic"
//! friendly_name = "TCP Cubic"
//! run_first = "receiver"
//!
//! [[scheme]]
//! name = "copa"
//! wrapper = "copa.sh"
//! commands = ["run_first", "receiver", "sender"]
//! ```
//!
//! Schemes keep the order they are declared in.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::side::{RunOrder, Side};

/// A sub-command understood by every scheme wrapper.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum WrapperCommand {
    #[display("deps")]
    Deps,
    #[display("run_first")]
    RunFirst,
    #[display("setup")]
    Setup,
    #[display("setup_after_reboot")]
    SetupAfterReboot,
    #[display("receiver")]
    Receiver,
    #[display("sender")]
    Sender,
}

impl WrapperCommand {
    pub const ALL: [WrapperCommand; 6] = [
        WrapperCommand::Deps,
        WrapperCommand::RunFirst,
        WrapperCommand::Setup,
        WrapperCommand::SetupAfterReboot,
        WrapperCommand::Receiver,
        WrapperCommand::Sender,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WrapperCommand::Deps => "deps",
            WrapperCommand::RunFirst => "run_first",
            WrapperCommand::Setup => "setup",
            WrapperCommand::SetupAfterReboot => "setup_after_reboot",
            WrapperCommand::Receiver => "receiver",
            WrapperCommand::Sender => "sender",
        }
    }
}

impl From<Side> for WrapperCommand {
    fn from(side: Side) -> Self {
        match side {
            Side::Sender => WrapperCommand::Sender,
            Side::Receiver => WrapperCommand::Receiver,
        }
    }
}

/// Everything the harness knows about one scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeDescriptor {
    /// The identifier used on the command line and in log file names.
    pub name: String,
    /// A human friendly name, if one was declared.
    pub friendly_name: Option<String>,
    /// Absolute or registry-relative path to the wrapper executable.
    pub wrapper: PathBuf,
    /// The sub-commands this wrapper supports.
    pub commands: Vec<WrapperCommand>,
    /// The side that runs first, when declared in the registry rather than asked of the wrapper.
    pub run_first: Option<Side>,
}

impl SchemeDescriptor {
    /// The friendly name if one was declared, otherwise the scheme name.
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.name)
    }

    pub fn supports(&self, command: WrapperCommand) -> bool {
        self.commands.contains(&command)
    }

    pub fn ensure_supports(&self, command: WrapperCommand) -> Result<(), ConfigError> {
        if self.supports(command) {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedCommand {
                scheme: self.name.clone(),
                command,
            })
        }
    }

    /// Check the wrapper exists and can be executed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let metadata = fs::metadata(&self.wrapper).map_err(|_| ConfigError::MissingWrapper {
            scheme: self.name.clone(),
            path: self.wrapper.clone(),
        })?;
        if !metadata.is_file() {
            return Err(ConfigError::MissingWrapper {
                scheme: self.name.clone(),
                path: self.wrapper.clone(),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;

            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(ConfigError::WrapperNotExecutable {
                    scheme: self.name.clone(),
                    path: self.wrapper.clone(),
                });
            }
        }

        Ok(())
    }

    /// Ask the wrapper which side must run first, unless the registry already declares it.
    pub fn resolve_run_order(&self) -> Result<RunOrder, ConfigError> {
        if let Some(first) = self.run_first {
            return Ok(RunOrder::new(first));
        }
        self.ensure_supports(WrapperCommand::RunFirst)?;

        log::debug!("Asking '{}' which side runs first", self.wrapper.display());
        let output = Command::new(&self.wrapper)
            .arg(WrapperCommand::RunFirst.as_str())
            .output()
            .map_err(|e| ConfigError::InvalidRunOrder {
                scheme: self.name.clone(),
                reason: format!("failed to run wrapper: {e}"),
            })?;
        if !output.status.success() {
            return Err(ConfigError::InvalidRunOrder {
                scheme: self.name.clone(),
                reason: format!("wrapper exited with {}", output.status),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .parse::<Side>()
            .map(RunOrder::new)
            .map_err(|e| ConfigError::InvalidRunOrder {
                scheme: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    wrappers_dir: Option<PathBuf>,
    #[serde(default, rename = "scheme")]
    schemes: Vec<SchemeEntry>,
}

#[derive(Debug, Deserialize)]
struct SchemeEntry {
    name: String,
    friendly_name: Option<String>,
    wrapper: Option<PathBuf>,
    commands: Option<Vec<WrapperCommand>>,
    run_first: Option<Side>,
}

/// The set of schemes available to the harness, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct SchemeRegistry {
    wrappers_dir: PathBuf,
    schemes: Vec<SchemeDescriptor>,
}

impl SchemeRegistry {
    /// Load a registry file. Relative paths inside it are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml_str(&content, &base_dir)
    }

    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let file: RegistryFile = toml::from_str(content)?;
        let wrappers_dir = base_dir.join(file.wrappers_dir.unwrap_or_else(|| "wrappers".into()));

        let schemes = file
            .schemes
            .into_iter()
            .map(|entry| SchemeDescriptor {
                wrapper: wrappers_dir.join(entry.wrapper.unwrap_or_else(|| entry.name.clone().into())),
                name: entry.name,
                friendly_name: entry.friendly_name,
                commands: entry
                    .commands
                    .unwrap_or_else(|| WrapperCommand::ALL.to_vec()),
                run_first: entry.run_first,
            })
            .collect();

        Ok(Self {
            wrappers_dir,
            schemes,
        })
    }

    pub fn wrappers_dir(&self) -> &Path {
        &self.wrappers_dir
    }

    pub fn get(&self, name: &str) -> Result<&SchemeDescriptor, ConfigError> {
        self.schemes
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::UnknownScheme(name.to_string()))
    }

    /// Look up a scheme and check its wrapper can be run.
    pub fn validate(&self, name: &str) -> Result<&SchemeDescriptor, ConfigError> {
        let descriptor = self.get(name)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemes.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}
