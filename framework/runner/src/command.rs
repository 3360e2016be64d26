//! Typed endpoint command lines.
//!
//! An endpoint is started as `<wrapper> <side> [<peer address>] <port>`. The peer address is not
//! always known when the command is built: inside the link emulator it is only available from the
//! emulator shell's environment. [`EndpointCommand`] keeps the peer address and port as typed
//! placeholders until [`EndpointLaunch::to_launch_command`] renders the final argv, so no shell
//! is ever needed to expand them.

use std::ffi::OsString;
use std::path::PathBuf;

use cc_tunnel_core::prelude::Side;

/// Environment variable the link emulator sets to the address of the host outside the link.
pub const EMULATOR_PEER_ENV: &str = "MAHIMAHI_BASE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointArg {
    Literal(String),
    PeerAddr,
    PeerPort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCommand {
    pub program: PathBuf,
    pub args: Vec<EndpointArg>,
}

impl EndpointCommand {
    /// The endpoint that starts first and listens on the port.
    pub fn listener(wrapper: impl Into<PathBuf>, side: Side) -> Self {
        Self {
            program: wrapper.into(),
            args: vec![
                EndpointArg::Literal(side.as_str().to_string()),
                EndpointArg::PeerPort,
            ],
        }
    }

    /// The endpoint that starts second and connects to the listener.
    pub fn connector(wrapper: impl Into<PathBuf>, side: Side) -> Self {
        Self {
            program: wrapper.into(),
            args: vec![
                EndpointArg::Literal(side.as_str().to_string()),
                EndpointArg::PeerAddr,
                EndpointArg::PeerPort,
            ],
        }
    }

    /// Position of the peer address among the arguments, not counting the program.
    pub fn peer_addr_index(&self) -> Option<usize> {
        self.args.iter().position(|a| *a == EndpointArg::PeerAddr)
    }

    /// Program followed by its rendered arguments.
    pub fn render(&self, peer_addr: &str, port: u16) -> Vec<OsString> {
        std::iter::once(self.program.clone().into_os_string())
            .chain(self.args.iter().map(|arg| match arg {
                EndpointArg::Literal(s) => OsString::from(s),
                EndpointArg::PeerAddr => OsString::from(peer_addr),
                EndpointArg::PeerPort => OsString::from(port.to_string()),
            }))
            .collect()
    }
}

/// Where the peer address of an endpoint comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddr {
    Literal(String),
    /// Read from an environment variable by the endpoint shim at `shim_exe`.
    Env { var: String, shim_exe: PathBuf },
}

/// Where an endpoint process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Local,
    /// On a remote host, over ssh.
    Ssh { destination: String },
    /// Inside the link emulator, started with this argv followed by `--` and the endpoint.
    Emulated { emulator_argv: Vec<OsString> },
}

/// Everything needed to start one endpoint once the port is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointLaunch {
    pub side: Side,
    pub command: EndpointCommand,
    pub placement: Placement,
    pub peer: Option<PeerAddr>,
}

/// A fully rendered command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl LaunchCommand {
    fn from_argv(mut argv: Vec<OsString>) -> Self {
        let program = if argv.is_empty() {
            OsString::new()
        } else {
            argv.remove(0)
        };
        Self {
            program,
            args: argv,
        }
    }

    pub fn argv(&self) -> impl Iterator<Item = &OsString> {
        std::iter::once(&self.program).chain(self.args.iter())
    }

    /// Space-joined command line, for logging.
    pub fn display(&self) -> String {
        self.argv()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl EndpointLaunch {
    pub fn to_launch_command(&self, port: u16) -> LaunchCommand {
        let argv = match &self.peer {
            None => self.command.render("", port),
            Some(PeerAddr::Literal(addr)) => self.command.render(addr, port),
            Some(PeerAddr::Env { var, shim_exe }) => {
                let index = self.command.peer_addr_index().unwrap_or_default();
                let mut argv = vec![
                    shim_exe.clone().into_os_string(),
                    "endpoint".into(),
                    "--peer-env".into(),
                    var.into(),
                    "--peer-arg".into(),
                    index.to_string().into(),
                    "--".into(),
                ];
                argv.extend(self.command.render(&format!("${var}"), port));
                argv
            }
        };

        match &self.placement {
            Placement::Local => LaunchCommand::from_argv(argv),
            Placement::Ssh { destination } => {
                let mut ssh = vec![OsString::from("ssh"), OsString::from(destination)];
                ssh.extend(argv);
                LaunchCommand::from_argv(ssh)
            }
            Placement::Emulated { emulator_argv } => {
                let mut wrapped = emulator_argv.clone();
                wrapped.push("--".into());
                wrapped.extend(argv);
                LaunchCommand::from_argv(wrapped)
            }
        }
    }
}
