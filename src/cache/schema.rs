// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the story cache database
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- stories: mirror of the signed-in user's travel stories, keyed by server id
CREATE TABLE IF NOT EXISTS stories (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    story TEXT NOT NULL,
    image_url TEXT NOT NULL,
    visited_location_json TEXT NOT NULL,
    visited_date TEXT NOT NULL,
    created_on TEXT NOT NULL,
    is_favourite INTEGER NOT NULL DEFAULT 0,
    show_on_profile INTEGER NOT NULL DEFAULT 0,
    fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stories_visited_date ON stories(visited_date DESC);
"#;
