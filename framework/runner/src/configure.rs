use std::path::PathBuf;
use std::time::Duration;

use cc_tunnel_core::prelude::{
    ConfigError, ExecutionMode, LogPaths, RunSpec, SchemeRegistry, ServerSide, WrapperCommand,
};

use crate::command::{EndpointCommand, EndpointLaunch, PeerAddr, Placement, EMULATOR_PEER_ENV};
use crate::emulator::{emulator_argv, mm_link_path};

/// Default time between starting the first endpoint and starting the second.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(3);

/// Default time a process group gets to exit after `SIGTERM` before it is sent `SIGKILL`.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Host-level settings that apply to every run of a batch.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Time between starting the first endpoint and starting the second.
    pub settle: Duration,
    /// Time a process group gets to exit after `SIGTERM`.
    pub kill_grace: Duration,
    /// The `cc-tunnel` binary, used as the endpoint shim inside the link emulator.
    pub shim_exe: PathBuf,
    /// The link emulator. Looked up with [`mm_link_path`] when not set.
    pub mm_link: Option<PathBuf>,
}

impl LaunchSettings {
    pub fn new(shim_exe: impl Into<PathBuf>) -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            kill_grace: DEFAULT_KILL_GRACE,
            shim_exe: shim_exe.into(),
            mm_link: None,
        }
    }

    /// Settings that use the running executable as the endpoint shim.
    pub fn from_current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn with_mm_link(mut self, mm_link: impl Into<PathBuf>) -> Self {
        self.mm_link = Some(mm_link.into());
        self
    }
}

/// A run with every path and command line worked out, ready to launch.
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    pub spec: RunSpec,
    pub log_paths: LogPaths,
    pub first: EndpointLaunch,
    pub second: EndpointLaunch,
    pub settle: Duration,
    pub kill_grace: Duration,
}

/// Work out log paths and both endpoint command lines for a run.
///
/// Every check that can fail happens here, before anything is spawned.
pub fn configure(
    spec: &RunSpec,
    registry: &SchemeRegistry,
    settings: &LaunchSettings,
) -> Result<ResolvedRun, ConfigError> {
    let descriptor = registry.validate(spec.scheme())?;
    let order = spec.run_order();
    descriptor.ensure_supports(WrapperCommand::from(order.first))?;
    descriptor.ensure_supports(WrapperCommand::from(order.second()))?;

    let wrapper = descriptor.wrapper.clone();
    let local = |placement: Placement, wrapper: PathBuf| EndpointLaunch {
        side: order.first,
        command: EndpointCommand::listener(wrapper, order.first),
        placement,
        peer: None,
    };

    let (first, second) = match spec.mode() {
        ExecutionMode::Local => (
            local(Placement::Local, wrapper.clone()),
            EndpointLaunch {
                side: order.second(),
                command: EndpointCommand::connector(wrapper, order.second()),
                placement: Placement::Local,
                peer: Some(PeerAddr::Literal("127.0.0.1".to_string())),
            },
        ),
        ExecutionMode::Emulated(emulation) => {
            emulation.validate()?;
            let mm_link = match &settings.mm_link {
                Some(path) => path.clone(),
                None => mm_link_path()?,
            };
            let directions = spec.directions_for(emulation);
            log::debug!(
                "Emulated link for {}: uplink {} -> {}, downlink {} -> {}",
                spec.scheme(),
                directions.uplink_trace.display(),
                directions.uplink_log.display(),
                directions.downlink_trace.display(),
                directions.downlink_log.display(),
            );

            (
                local(Placement::Local, wrapper.clone()),
                EndpointLaunch {
                    side: order.second(),
                    command: EndpointCommand::connector(wrapper, order.second()),
                    placement: Placement::Emulated {
                        emulator_argv: emulator_argv(&mm_link, emulation, &directions),
                    },
                    peer: Some(PeerAddr::Env {
                        var: EMULATOR_PEER_ENV.to_string(),
                        shim_exe: settings.shim_exe.clone(),
                    }),
                },
            )
        }
        ExecutionMode::Remote(remote) => {
            let remote_wrapper = remote.wrapper_path(&wrapper);
            let ssh = Placement::Ssh {
                destination: remote.destination.clone(),
            };
            match remote.server_side {
                ServerSide::Local => (
                    local(Placement::Local, wrapper),
                    EndpointLaunch {
                        side: order.second(),
                        command: EndpointCommand::connector(remote_wrapper, order.second()),
                        placement: ssh,
                        peer: Some(PeerAddr::Literal(remote.local_addr.clone())),
                    },
                ),
                ServerSide::Remote => (
                    local(ssh, remote_wrapper),
                    EndpointLaunch {
                        side: order.second(),
                        command: EndpointCommand::connector(wrapper, order.second()),
                        placement: Placement::Local,
                        peer: Some(PeerAddr::Literal(remote.host.clone())),
                    },
                ),
            }
        }
    };

    Ok(ResolvedRun {
        spec: spec.clone(),
        log_paths: spec.log_paths(),
        first,
        second,
        settle: settings.settle,
        kill_grace: settings.kill_grace,
    })
}
