//! # Network Availability
//!
//! The scheduler polls a [`NetworkMonitor`] once per pass and once per
//! `add_task`. Hosts either implement the trait over their platform API or
//! toggle a [`NetworkFlag`] from a connectivity callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Boolean connectivity oracle.
pub trait NetworkMonitor: Send + Sync {
    /// Returns true if uploads can currently reach the server.
    fn is_network_available(&self) -> bool;
}

/// Shared, host-driven connectivity flag.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct NetworkFlag {
    online: Arc<AtomicBool>,
}

impl NetworkFlag {
    /// Creates a flag with the given initial state.
    pub fn new(online: bool) -> Self {
        NetworkFlag {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    /// Updates the flag and returns the previous state.
    pub fn set(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::SeqCst)
    }

    /// Returns the current state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl Default for NetworkFlag {
    fn default() -> Self {
        NetworkFlag::new(true)
    }
}

impl NetworkMonitor for NetworkFlag {
    fn is_network_available(&self) -> bool {
        self.is_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = NetworkFlag::new(false);
        let clone = flag.clone();

        assert!(!clone.is_network_available());
        assert!(!flag.set(true));
        assert!(clone.is_network_available());
        assert!(clone.set(false));
        assert!(!flag.is_online());
    }
}
