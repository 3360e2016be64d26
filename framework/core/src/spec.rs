use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mode::{ExecutionMode, LinkEmulation};
use crate::side::RunOrder;

/// One timed execution of a scheme's sender and receiver.
///
/// A [`RunSpec`] is created once per `(scheme, run_id)` pair and is not changed afterwards. Every
/// stage of a run reads from it; state that does change while a run is in progress, such as
/// process handles and timestamps, is held by the orchestrator instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    scheme: String,
    run_id: u32,
    mode: ExecutionMode,
    run_order: RunOrder,
    timeout: Duration,
    data_dir: PathBuf,
}

impl RunSpec {
    pub fn new(
        scheme: impl Into<String>,
        run_id: u32,
        mode: ExecutionMode,
        run_order: RunOrder,
        timeout: Duration,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            run_id,
            mode,
            run_order,
            timeout,
            data_dir: data_dir.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn run_id(&self) -> u32 {
        self.run_id
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    pub fn run_order(&self) -> RunOrder {
        self.run_order
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_paths(&self) -> LogPaths {
        LogPaths::new(&self.data_dir, &self.scheme, self.run_id)
    }

    /// Trace and log files for each direction of the emulated link, if this run is emulated.
    ///
    /// The uplink carries traffic from the second endpoint to the first. When the receiver runs
    /// first that is the data direction, otherwise it is the ack direction.
    pub fn link_directions(&self) -> Option<LinkDirections> {
        match &self.mode {
            ExecutionMode::Emulated(emulation) => Some(self.directions_for(emulation)),
            _ => None,
        }
    }

    /// Like [`RunSpec::link_directions`], for an emulation already matched out of the mode.
    pub fn directions_for(&self, emulation: &LinkEmulation) -> LinkDirections {
        let logs = self.log_paths();

        if self.run_order.receiver_first() {
            LinkDirections {
                uplink_trace: emulation.uplink_trace.clone(),
                downlink_trace: emulation.downlink_trace.clone(),
                uplink_log: logs.mm_datalink,
                downlink_log: logs.mm_acklink,
            }
        } else {
            LinkDirections {
                uplink_trace: emulation.downlink_trace.clone(),
                downlink_trace: emulation.uplink_trace.clone(),
                uplink_log: logs.mm_acklink,
                downlink_log: logs.mm_datalink,
            }
        }
    }
}

/// Where a run's logs are written. Derived only from `(data_dir, scheme, run_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub datalink: PathBuf,
    pub acklink: PathBuf,
    pub mm_datalink: PathBuf,
    pub mm_acklink: PathBuf,
}

impl LogPaths {
    pub fn new(data_dir: &Path, scheme: &str, run_id: u32) -> Self {
        let log = |kind: &str| data_dir.join(format!("{scheme}_{kind}_run{run_id}.log"));
        Self {
            datalink: log("datalink"),
            acklink: log("acklink"),
            mm_datalink: log("mm_datalink"),
            mm_acklink: log("mm_acklink"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDirections {
    pub uplink_trace: PathBuf,
    pub downlink_trace: PathBuf,
    pub uplink_log: PathBuf,
    pub downlink_log: PathBuf,
}
