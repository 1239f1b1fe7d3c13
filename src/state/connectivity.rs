// SPDX-License-Identifier: MPL-2.0

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

type TransitionHandler = Box<dyn Fn(bool) + Send + Sync>;

/// Single online/offline signal with edge notifications.
///
/// The host feeds status changes in through `set_online`; the monitor itself
/// performs no work on a transition beyond telling subscribers. Every edge is
/// delivered, nothing is coalesced.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    handlers: Mutex<Vec<TransitionHandler>>,
    events: broadcast::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            online: AtomicBool::new(initially_online),
            handlers: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Register a handler called once per transition with the new state.
    /// Handlers run on the thread reporting the change and must not register
    /// further handlers.
    pub fn on_transition<F>(&self, handler: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.push(Box::new(handler));
        }
    }

    /// Async view of the same transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.events.subscribe()
    }

    /// Report the runtime's current status. Returns true if this was an edge.
    pub fn set_online(&self, online: bool) -> bool {
        if self.online.swap(online, Ordering::AcqRel) == online {
            return false;
        }

        tracing::info!(online, "connectivity changed");

        if let Ok(handlers) = self.handlers.lock() {
            for handler in handlers.iter() {
                handler(online);
            }
        }
        // No receivers is fine
        let _ = self.events.send(online);
        true
    }
}
