// SPDX-License-Identifier: MPL-2.0

use crate::state::ConnectivityMonitor;
use tokio::sync::broadcast;

/// Things the user should be told about, independent of any UI toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The service rejected our credential. Local session state must be
    /// cleared and the user sent back to sign-in.
    SessionExpired,
    /// A reconnect refetch replaced the cache.
    Synced { stories: usize },
    /// A reconnect refetch failed; the cache was left as it was.
    SyncFailed(String),
}

/// Application-wide state shared by the query layer, the reconnect sync and
/// the front end. Passed in explicitly; nothing reads it from a global.
pub struct AppState {
    connectivity: ConnectivityMonitor,
    notices: broadcast::Sender<Notice>,
}

impl AppState {
    pub fn new(initially_online: bool) -> Self {
        let (notices, _) = broadcast::channel(64);
        Self {
            connectivity: ConnectivityMonitor::new(initially_online),
            notices,
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn notify(&self, notice: Notice) {
        tracing::debug!(?notice, "notice");
        let _ = self.notices.send(notice);
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}
