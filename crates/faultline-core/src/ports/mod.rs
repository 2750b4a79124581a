//! Port traits (driven/secondary ports)
//!
//! Interfaces through which the SDK touches the outside world: the
//! collector endpoint, connectivity signals, caller-registered recovery
//! handlers, and form snapshot persistence.

pub mod connectivity;
pub mod recovery;
pub mod transmitter;

pub use connectivity::{IConnectivityMonitor, StaticConnectivity};
pub use recovery::{IRecoveryHandler, ISnapshotStore};
pub use transmitter::{IBeacon, ITransmitter};
