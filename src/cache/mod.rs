// SPDX-License-Identifier: MPL-2.0

mod db;
mod local;
mod schema;
mod stories;

pub use db::CacheDb;
pub use local::LocalStoryCache;
pub use stories::{StoryCache, StoryPatch};

#[cfg(test)]
pub(crate) use local::tests::broken_cache;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt cache row: {0}")]
    Decode(String),
    #[error("database path error: {0}")]
    Path(String),
    #[error("cache storage unavailable")]
    Unavailable,
}
