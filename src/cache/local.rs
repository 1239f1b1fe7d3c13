// SPDX-License-Identifier: MPL-2.0

use crate::api::StoryRecord;
use crate::cache::{CacheDb, CacheError, StoryCache, StoryPatch};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Best-effort offline mirror of the signed-in user's stories.
///
/// Every operation swallows storage failures: reads come back empty, writes
/// become no-ops, and the error is logged. Operations are serialized through a
/// fair lock so a patch and a full replace apply in the order they were issued.
#[derive(Clone)]
pub struct LocalStoryCache {
    db: Option<CacheDb>,
    schema_ready: Arc<AtomicBool>,
    gate: Arc<Mutex<()>>,
}

impl LocalStoryCache {
    pub fn new(db: CacheDb) -> Self {
        tracing::debug!(user = db.user_id(), "story cache attached");
        Self {
            db: Some(db),
            schema_ready: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Open the per-user cache in the data directory, or a disabled cache if
    /// storage can't be opened.
    pub fn open(user_id: &str) -> Self {
        match CacheDb::open(user_id) {
            Ok(db) => Self::new(db),
            Err(e) => {
                tracing::warn!(error = %e, "story cache unavailable, continuing without it");
                Self::disabled()
            }
        }
    }

    pub fn open_at(path: &Path, user_id: &str) -> Self {
        match CacheDb::open_at(path, user_id) {
            Ok(db) => Self::new(db),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "story cache unavailable");
                Self::disabled()
            }
        }
    }

    /// A cache with no backing storage: reads are empty, writes do nothing.
    pub fn disabled() -> Self {
        Self {
            db: None,
            schema_ready: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub async fn replace_all(&self, stories: &[StoryRecord]) {
        let stories = stories.to_vec();
        let count = stories.len();
        if self
            .run("replace_all", move |db| StoryCache::new(db).replace_all(&stories))
            .await
            .is_some()
        {
            tracing::debug!(count, "story cache replaced");
        }
    }

    pub async fn get_all(&self) -> Vec<StoryRecord> {
        self.run("get_all", |db| StoryCache::new(db).get_all())
            .await
            .unwrap_or_default()
    }

    /// No-op when the story isn't cached.
    pub async fn patch_field(&self, id: &str, patch: StoryPatch) {
        let id = id.to_string();
        let outcome = self
            .run("patch_field", move |db| StoryCache::new(db).patch(&id, &patch))
            .await;
        if outcome == Some(false) {
            tracing::debug!("patched story is not cached, nothing to update");
        }
    }

    /// When the cached set was last replaced from the service.
    pub async fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.run("last_synced", |db| StoryCache::new(db).last_fetched())
            .await
            .flatten()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub async fn has_any(&self) -> bool {
        self.run("has_any", |db| StoryCache::new(db).count())
            .await
            .is_some_and(|count| count > 0)
    }

    async fn run<T, F>(&self, operation: &'static str, op: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&CacheDb) -> Result<T, CacheError> + Send + 'static,
    {
        let db = self.db.clone()?;
        let schema_ready = Arc::clone(&self.schema_ready);
        // Held by the blocking task itself, so a caller that stops waiting
        // can't let the next operation overtake this one.
        let guard = Arc::clone(&self.gate).lock_owned().await;

        let result = tokio::task::spawn_blocking(move || -> Result<T, CacheError> {
            let _guard = guard;
            if !schema_ready.load(Ordering::Acquire) {
                db.ensure_schema()?;
                schema_ready.store(true, Ordering::Release);
            }
            op(&db)
        })
        .await;

        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(operation, error = %e, "story cache operation failed");
                None
            }
            Err(e) => {
                tracing::warn!(operation, error = %e, "story cache task aborted");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::filter::tests::story;
    use tempfile::TempDir;

    pub(crate) fn broken_cache(dir: &TempDir) -> LocalStoryCache {
        // A table with the right name but the wrong shape: schema setup and
        // every statement against it fail.
        let path = dir.path().join("cache.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE stories (id TEXT PRIMARY KEY);")
            .unwrap();
        drop(conn);
        LocalStoryCache::open_at(&path, "u1")
    }

    #[tokio::test]
    async fn test_schema_is_created_on_first_use() {
        let dir = TempDir::new().unwrap();
        let cache = LocalStoryCache::open_at(&dir.path().join("nested/cache.db"), "u1");

        assert!(!cache.has_any().await);
        cache
            .replace_all(&[story("a", "A", (2024, 1, 1), false)])
            .await;
        assert!(cache.has_any().await);
    }

    #[tokio::test]
    async fn test_replace_all_twice_yields_same_set() {
        let dir = TempDir::new().unwrap();
        let cache = LocalStoryCache::open_at(&dir.path().join("cache.db"), "u1");
        let set = vec![
            story("a", "A", (2024, 1, 1), false),
            story("b", "B", (2024, 2, 1), true),
        ];

        cache.replace_all(&set).await;
        cache.replace_all(&set).await;

        let mut all = cache.get_all().await;
        all.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(all, set);
    }

    #[tokio::test]
    async fn test_patch_missing_id_leaves_cache_unchanged() {
        let dir = TempDir::new().unwrap();
        let cache = LocalStoryCache::open_at(&dir.path().join("cache.db"), "u1");
        let set = vec![story("a", "A", (2024, 1, 1), false)];
        cache.replace_all(&set).await;

        cache
            .patch_field("missing", StoryPatch::IsFavourite(true))
            .await;

        assert_eq!(cache.get_all().await, set);
    }

    #[tokio::test]
    async fn test_patch_then_replace_apply_in_call_order() {
        let dir = TempDir::new().unwrap();
        let cache = LocalStoryCache::open_at(&dir.path().join("cache.db"), "u1");
        cache
            .replace_all(&[story("a", "A", (2024, 1, 1), false)])
            .await;

        let fresh = vec![story("a", "A", (2024, 1, 1), false)];
        let patching = cache.patch_field("a", StoryPatch::IsFavourite(true));
        let replacing = cache.replace_all(&fresh);
        tokio::join!(patching, replacing);

        // The replace was issued last, so its snapshot wins.
        assert_eq!(cache.get_all().await, fresh);
    }

    #[tokio::test]
    async fn test_abandoned_replace_still_lands_before_next_read() {
        let dir = TempDir::new().unwrap();
        let cache = LocalStoryCache::open_at(&dir.path().join("cache.db"), "u1");
        let set: Vec<StoryRecord> = (0..200)
            .map(|i| story(&format!("s{i}"), "Trip", (2024, 1, 1), false))
            .collect();

        // Polled once, then dropped while the write is in flight
        let _ = tokio::time::timeout(std::time::Duration::ZERO, cache.replace_all(&set)).await;

        assert_eq!(cache.get_all().await.len(), set.len());
    }

    #[tokio::test]
    async fn test_last_synced() {
        let dir = TempDir::new().unwrap();
        let cache = LocalStoryCache::open_at(&dir.path().join("cache.db"), "u1");
        assert!(cache.last_synced().await.is_none());

        cache
            .replace_all(&[story("a", "A", (2024, 1, 1), false)])
            .await;
        let synced = cache.last_synced().await.unwrap();
        assert!(Utc::now().signed_duration_since(synced).num_seconds() < 60);

        assert!(LocalStoryCache::disabled().last_synced().await.is_none());
    }

    #[tokio::test]
    async fn test_broken_storage_degrades_quietly() {
        let dir = TempDir::new().unwrap();
        let cache = broken_cache(&dir);

        cache
            .replace_all(&[story("a", "A", (2024, 1, 1), false)])
            .await;
        cache.patch_field("a", StoryPatch::Title("B".into())).await;

        assert!(cache.get_all().await.is_empty());
        assert!(!cache.has_any().await);
    }

    #[tokio::test]
    async fn test_disabled_cache_is_empty() {
        let cache = LocalStoryCache::disabled();
        cache
            .replace_all(&[story("a", "A", (2024, 1, 1), false)])
            .await;
        assert!(cache.get_all().await.is_empty());
        assert!(!cache.has_any().await);
    }
}
