// SPDX-License-Identifier: MPL-2.0

//! Refetch-on-reconnect.
//!
//! Each offline to online edge triggers one full "all stories" fetch, which
//! replaces the cache wholesale. Nothing is merged and nothing is retried; a
//! failed refetch leaves the cache as it was and is reported as a notice.

use crate::query::{DataOrigin, QueryError, StoryQueries};
use crate::state::Notice;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub struct ReconnectSync {
    queries: Arc<StoryQueries>,
}

impl ReconnectSync {
    pub fn new(queries: Arc<StoryQueries>) -> Self {
        Self { queries }
    }

    /// React to a single transition. Returns the number of stories fetched for
    /// an online edge, `None` when nothing was fetched: an offline edge, or an
    /// online edge that connectivity dropped again before the refetch ran.
    pub async fn handle_transition(&self, now_online: bool) -> Option<Result<usize, QueryError>> {
        if !now_online {
            tracing::debug!("went offline, serving from cache");
            return None;
        }

        let state = self.queries.state();
        match self.queries.all_stories().await {
            Ok(outcome) if outcome.origin() != Some(DataOrigin::Remote) => {
                tracing::debug!("connectivity dropped before resync, skipped");
                None
            }
            Ok(outcome) => {
                let stories = outcome.stories().len();
                tracing::info!(stories, "resynced after reconnect");
                state.notify(Notice::Synced { stories });
                Some(Ok(stories))
            }
            Err(e) => {
                tracing::warn!(error = %e, "resync after reconnect failed");
                // Session expiry has already been announced by the query layer
                if !matches!(e, QueryError::SessionExpired) {
                    state.notify(Notice::SyncFailed(e.to_string()));
                }
                Some(Err(e))
            }
        }
    }

    /// Subscribe to connectivity now and return the loop that serves it.
    /// Subscribing before the future is spawned means no edge is missed.
    pub fn listen(self) -> impl Future<Output = ()> + Send + 'static {
        let mut transitions = self.queries.state().connectivity().subscribe();

        async move {
            loop {
                match transitions.recv().await {
                    Ok(now_online) => {
                        self.handle_transition(now_online).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "connectivity events dropped");
                        if self.queries.state().is_online() {
                            self.handle_transition(true).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}
