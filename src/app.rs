// SPDX-License-Identifier: MPL-2.0

use crate::api::{ClientError, DataSource, FixtureDataSource, RemoteDataSource, Session, User};
use crate::cache::LocalStoryCache;
use crate::query::{QueryError, StoryQueries};
use crate::state::{AppSettings, AppState, Notice, SessionError, SessionStore};
use crate::sync::ReconnectSync;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level controller: owns the data source, the application state and the
/// signed-in user's query layer.
pub struct TravelBookApp {
    source: Arc<dyn DataSource>,
    state: Arc<AppState>,
    sessions: Arc<dyn SessionStore>,
    cache_dir: Option<PathBuf>,
    session: Option<Session>,
    queries: Option<Arc<StoryQueries>>,
}

impl TravelBookApp {
    /// Build the data source the settings ask for. Connectivity starts from
    /// whatever the caller observed.
    pub fn new(
        settings: &AppSettings,
        sessions: Arc<dyn SessionStore>,
        initially_online: bool,
    ) -> Result<Self, ClientError> {
        let source: Arc<dyn DataSource> = if settings.use_fixtures {
            tracing::info!("using fixture data source");
            Arc::new(FixtureDataSource::with_samples())
        } else {
            Arc::new(RemoteDataSource::new(
                &settings.api_base_url,
                settings.request_timeout(),
            )?)
        };

        Ok(Self::with_source(
            source,
            sessions,
            Arc::new(AppState::new(initially_online)),
        ))
    }

    pub fn with_source(
        source: Arc<dyn DataSource>,
        sessions: Arc<dyn SessionStore>,
        state: Arc<AppState>,
    ) -> Self {
        Self {
            source,
            state,
            sessions,
            cache_dir: None,
            session: None,
            queries: None,
        }
    }

    /// Keep per-user caches under `dir` instead of the data directory.
    pub fn with_cache_dir(mut self, dir: &Path) -> Self {
        self.cache_dir = Some(dir.to_path_buf());
        self
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// The signed-in user's query layer.
    pub fn queries(&self) -> Result<Arc<StoryQueries>, QueryError> {
        self.queries.clone().ok_or(QueryError::NotSignedIn)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, QueryError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(QueryError::Validation(
                "Please enter your email and password".to_string(),
            ));
        }
        if !self.state.is_online() {
            return Err(QueryError::Offline);
        }

        let session = self
            .source
            .login(email.trim(), password)
            .await
            .map_err(QueryError::Remote)?;

        if let Err(e) = self.sessions.store(&session).await {
            tracing::warn!(error = %e, "failed to persist session");
        }
        tracing::info!(user = %session.user.email, "signed in");

        let user = session.user.clone();
        self.activate(session);
        Ok(user)
    }

    /// Pick up a session saved by an earlier run. Returns false when there is
    /// none to resume.
    pub async fn resume(&mut self) -> bool {
        match self.sessions.load().await {
            Ok(session) => {
                tracing::debug!(user = %session.user.email, "resuming session");
                self.activate(session);
                true
            }
            Err(SessionError::NotFound) => false,
            Err(e) => {
                tracing::warn!(error = %e, "stored session unreadable, sign in again");
                false
            }
        }
    }

    /// Re-read the signed-in user's profile. Offline, the stored copy is
    /// returned as-is.
    pub async fn refresh_user(&mut self) -> Result<User, QueryError> {
        let Some(session) = self.session.as_mut() else {
            return Err(QueryError::NotSignedIn);
        };
        if !self.state.is_online() {
            return Ok(session.user.clone());
        }

        match self.source.get_user().await {
            Ok(user) => {
                session.user = user.clone();
                if let Err(e) = self.sessions.store(session).await {
                    tracing::warn!(error = %e, "failed to persist refreshed profile");
                }
                Ok(user)
            }
            Err(e) if e.is_auth() => {
                self.state.notify(Notice::SessionExpired);
                Err(QueryError::SessionExpired)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch profile");
                Err(QueryError::Remote(e))
            }
        }
    }

    /// Drop the credential and the stored session. The story cache stays on
    /// disk for the next sign-in of the same user.
    pub async fn logout(&mut self) {
        self.source.set_token(None);
        self.session = None;
        self.queries = None;
        if let Err(e) = self.sessions.clear().await {
            tracing::warn!(error = %e, "failed to clear stored session");
        }
    }

    /// React to the session-expiry signal: forget everything session related
    /// so the next command starts from sign-in.
    pub async fn handle_session_expired(&mut self) {
        tracing::info!("session expired, signing out");
        self.logout().await;
    }

    /// Refetch-on-reconnect for the signed-in user.
    pub fn reconnect_sync(&self) -> Result<ReconnectSync, QueryError> {
        Ok(ReconnectSync::new(self.queries()?))
    }

    fn activate(&mut self, session: Session) {
        self.source.set_token(Some(session.access_token.clone()));

        let cache = match &self.cache_dir {
            Some(dir) => LocalStoryCache::open_at(
                &dir.join(cache_dir_name(&session.user)).join("cache.db"),
                &session.user.id,
            ),
            None => LocalStoryCache::open(&cache_dir_name(&session.user)),
        };

        self.queries = Some(Arc::new(StoryQueries::new(
            Arc::clone(&self.source),
            cache,
            Arc::clone(&self.state),
        )));
        self.session = Some(session);
    }
}

/// Users without an id from the service are keyed by email.
fn cache_dir_name(user: &User) -> String {
    let key = if user.id.is_empty() {
        &user.email
    } else {
        &user.id
    };
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
