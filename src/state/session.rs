// SPDX-License-Identifier: MPL-2.0

use crate::api::Session;
use crate::config::APP_ID;
use crate::state::settings::{AppSettings, SessionBackend};
use async_trait::async_trait;
use secret_service::{Collection, EncryptionType, SecretService};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const SECRET_LABEL: &str = "Travel Book Session";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("secret service unavailable: {0}")]
    SecretService(String),
    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("session not found")]
    NotFound,
    #[error("invalid session data: {0}")]
    InvalidData(String),
}

/// Where the signed-in session (bearer token and user) is kept between runs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, session: &Session) -> Result<(), SessionError>;

    async fn load(&self) -> Result<Session, SessionError>;

    /// Clearing an absent session is not an error.
    async fn clear(&self) -> Result<(), SessionError>;
}

/// The store the settings ask for.
pub fn open_store(settings: &AppSettings) -> Result<Arc<dyn SessionStore>, SessionError> {
    Ok(match settings.session_backend {
        SessionBackend::Keyring => Arc::new(KeyringSessionStore),
        SessionBackend::File => Arc::new(FileSessionStore::default_location()?),
    })
}

/// Persists session credentials via libsecret.
pub struct KeyringSessionStore;

impl KeyringSessionStore {
    async fn connect() -> Result<SecretService<'static>, SessionError> {
        SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))
    }

    async fn unlocked_collection<'a>(
        ss: &'a SecretService<'_>,
    ) -> Result<Collection<'a>, SessionError> {
        let collection = ss
            .get_default_collection()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        if collection.is_locked().await.unwrap_or(true) {
            collection
                .unlock()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        Ok(collection)
    }
}

#[async_trait]
impl SessionStore for KeyringSessionStore {
    async fn store(&self, session: &Session) -> Result<(), SessionError> {
        let ss = Self::connect().await?;
        let collection = Self::unlocked_collection(&ss).await?;

        let session_json =
            serde_json::to_string(session).map_err(|e| SessionError::InvalidData(e.to_string()))?;

        let attributes = vec![("application", APP_ID), ("user", session.user.id.as_str())];

        collection
            .create_item(
                SECRET_LABEL,
                attributes.into_iter().collect(),
                session_json.as_bytes(),
                true, // replace existing
                "text/plain",
            )
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        Ok(())
    }

    async fn load(&self) -> Result<Session, SessionError> {
        let ss = Self::connect().await?;
        let collection = Self::unlocked_collection(&ss).await?;

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        let item = items.first().ok_or(SessionError::NotFound)?;

        let secret = item
            .get_secret()
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        serde_json::from_slice(&secret).map_err(|e| SessionError::InvalidData(e.to_string()))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        let ss = Self::connect().await?;
        let collection = Self::unlocked_collection(&ss).await?;

        let attributes = vec![("application", APP_ID)];
        let items = collection
            .search_items(attributes.into_iter().collect())
            .await
            .map_err(|e| SessionError::SecretService(e.to_string()))?;

        for item in items {
            item.delete()
                .await
                .map_err(|e| SessionError::SecretService(e.to_string()))?;
        }

        Ok(())
    }
}

/// Session kept in a JSON file readable only by the owner, for machines
/// without a secret service.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// ~/.config/io.github.sethcottle.TravelBook/session.json
    pub fn default_location() -> Result<Self, SessionError> {
        let mut path = dirs::config_dir().ok_or_else(|| {
            SessionError::Storage(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine config directory",
            ))
        })?;
        path.push(APP_ID);
        path.push("session.json");
        Ok(Self { path })
    }

    pub fn at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Writes a fresh owner-only file next to the target and renames it over.
    fn write_private(&self, contents: &[u8]) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("json.tmp");
        match std::fs::remove_file(&staging) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let written = options.open(&staging).and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| std::fs::rename(&staging, &self.path)) {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn store(&self, session: &Session) -> Result<(), SessionError> {
        let session_json =
            serde_json::to_vec(session).map_err(|e| SessionError::InvalidData(e.to_string()))?;
        self.write_private(&session_json)
    }

    async fn load(&self) -> Result<Session, SessionError> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&contents).map_err(|e| SessionError::InvalidData(e.to_string()))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::User;
    use tempfile::TempDir;

    fn session() -> Session {
        Session {
            access_token: "jwt".into(),
            user: User {
                id: "u1".into(),
                full_name: "Ada".into(),
                email: "ada@example.com".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_store_load_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::at(&dir.path().join("nested/session.json"));

        assert!(matches!(store.load().await, Err(SessionError::NotFound)));

        store.store(&session()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), session());

        store.clear().await.unwrap();
        assert!(matches!(store.load().await, Err(SessionError::NotFound)));
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileSessionStore::at(&path).load().await,
            Err(SessionError::InvalidData(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        // A world-readable leftover must not keep its permissions
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileSessionStore::at(&path);
        store.store(&session()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(store.load().await.unwrap(), session());
    }
}
