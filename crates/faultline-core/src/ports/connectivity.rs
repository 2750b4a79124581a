//! Connectivity monitor port
//!
//! The reporter consults [`IConnectivityMonitor`] before each send and
//! subscribes to its watch channel to drain the offline queue on the
//! transition back online.
//!
//! [`StaticConnectivity`] is the default implementation: a watch channel
//! flipped explicitly by the host (or by tests). Hosts with real network
//! awareness implement the trait over their own signal source.

use tokio::sync::watch;

/// Port trait for online/offline signals
pub trait IConnectivityMonitor: Send + Sync {
    /// Returns the current connectivity state
    fn is_online(&self) -> bool;

    /// Returns a receiver observing connectivity transitions
    ///
    /// The receiver yields the new state on every transition; the current
    /// value is available immediately via `borrow`.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Explicitly-driven connectivity monitor
///
/// Starts online. `set_online(false)` / `set_online(true)` flip the state;
/// all subscribed receivers observe the transition.
pub struct StaticConnectivity {
    tx: watch::Sender<bool>,
}

impl StaticConnectivity {
    /// Creates a monitor in the given initial state
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Updates the connectivity state, notifying subscribers on change
    pub fn set_online(&self, online: bool) {
        // send_if_modified avoids waking subscribers on redundant updates
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl IConnectivityMonitor for StaticConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
