//! Types shared by the cc_tunnel run orchestrator and log summariser.

mod error;
mod mode;
mod scheme;
mod shutdown;
mod side;
mod spec;

pub mod prelude {
    pub use crate::error::ConfigError;
    pub use crate::mode::{split_hook, ExecutionMode, LinkEmulation, RemoteHost, ServerSide};
    pub use crate::scheme::{SchemeDescriptor, SchemeRegistry, WrapperCommand};
    pub use crate::shutdown::{ShutdownHandle, ShutdownListener};
    pub use crate::side::{ParseSideError, RunOrder, Side};
    pub use crate::spec::{LinkDirections, LogPaths, RunSpec};
}
