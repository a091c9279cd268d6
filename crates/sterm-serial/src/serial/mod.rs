//! Serial crate: sub-modules.

pub mod types;
pub mod error;
pub mod host;
pub mod port_scanner;
pub mod transport;
pub mod system;
pub mod recent;
pub mod config_flow;
pub mod session;
pub mod bridge;

// Re-export top-level items for convenience.
pub use types::*;
pub use error::{SerialError, SerialErrorKind, SerialResult};
pub use host::{DisplaySurface, HostShell, MemoryStateStore, StateStore};
pub use transport::{SerialDriver, SerialTransport, SimulatedDriver, SimulatedTransport};
pub use system::SystemDriver;
pub use recent::RecentConfigs;
pub use config_flow::PortConfigFlow;
pub use bridge::{ConnectOutcome, SessionBridge, SessionOptions};
pub use session::LinkEvent;
