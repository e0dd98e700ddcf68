//! Connectivity signal consumed by the coordinator

use std::sync::atomic::{AtomicBool, Ordering};

/// Current platform connectivity, read at call time rather than cached from
/// the last delivered event.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity flag fed by online/offline events
#[derive(Debug)]
pub struct ConnectivitySignal {
    online: AtomicBool,
}

impl ConnectivitySignal {
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityProbe for ConnectivitySignal {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
