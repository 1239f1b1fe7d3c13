// SPDX-License-Identifier: MPL-2.0

use crate::cache::CacheError;
use crate::cache::schema::SCHEMA;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle to the cache database for a specific user
#[derive(Clone)]
pub struct CacheDb {
    conn: Arc<Mutex<Connection>>,
    user_id: String,
}

impl CacheDb {
    /// Open or create cache database for user
    /// Path: ~/.local/share/travel-book/{user_id}/cache.db
    pub fn open(user_id: &str) -> Result<Self, CacheError> {
        let path = Self::cache_path(user_id)?;
        Self::open_at(&path, user_id)
    }

    /// Open a database file at an explicit location. The schema is not touched
    /// until `ensure_schema` runs.
    pub fn open_at(path: &Path, user_id: &str) -> Result<Self, CacheError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Path(format!("failed to create cache dir: {}", e)))?;
        }

        let conn = Connection::open(path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            user_id: user_id.to_string(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            user_id: "test".to_string(),
        })
    }

    /// Create tables and indexes if missing (all CREATE IF NOT EXISTS)
    pub fn ensure_schema(&self) -> Result<(), CacheError> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get XDG data directory for cache
    fn cache_path(user_id: &str) -> Result<PathBuf, CacheError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CacheError::Path("could not find data directory".to_string()))?;

        // Keep the id usable as a single path component
        let safe_id: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        Ok(data_dir.join("travel-book").join(safe_id).join("cache.db"))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Access connection for operations
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Unavailable)
    }

    /// Get current unix timestamp
    pub fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}
