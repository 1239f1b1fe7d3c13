// SPDX-License-Identifier: MPL-2.0

use crate::api::StoryRecord;
use crate::cache::{CacheDb, CacheError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use rusqlite::types::Value;

/// A single-field update applied to a cached story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryPatch {
    Title(String),
    Story(String),
    ImageUrl(String),
    VisitedLocation(Vec<String>),
    VisitedDate(NaiveDate),
    IsFavourite(bool),
    ShowOnProfile(bool),
}

impl StoryPatch {
    fn column(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Story(_) => "story",
            Self::ImageUrl(_) => "image_url",
            Self::VisitedLocation(_) => "visited_location_json",
            Self::VisitedDate(_) => "visited_date",
            Self::IsFavourite(_) => "is_favourite",
            Self::ShowOnProfile(_) => "show_on_profile",
        }
    }

    fn value(&self) -> Result<Value, CacheError> {
        Ok(match self {
            Self::Title(s) | Self::Story(s) | Self::ImageUrl(s) => Value::Text(s.clone()),
            Self::VisitedLocation(l) => Value::Text(serde_json::to_string(l)?),
            Self::VisitedDate(d) => Value::Text(format_date(d)),
            Self::IsFavourite(b) | Self::ShowOnProfile(b) => Value::Integer(*b as i64),
        })
    }
}

/// Cache operations for stories
pub struct StoryCache<'a> {
    db: &'a CacheDb,
}

impl<'a> StoryCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Drop every cached story and store the given set, in one transaction
    pub fn replace_all(&self, stories: &[StoryRecord]) -> Result<(), CacheError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;
        let now = CacheDb::now();

        tx.execute("DELETE FROM stories", [])?;

        for story in stories {
            let locations = serde_json::to_string(&story.visited_location)?;

            tx.execute(
                r#"
                INSERT INTO stories (
                    id, title, story, image_url, visited_location_json,
                    visited_date, created_on, is_favourite, show_on_profile, fetched_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    story = excluded.story,
                    image_url = excluded.image_url,
                    visited_location_json = excluded.visited_location_json,
                    visited_date = excluded.visited_date,
                    created_on = excluded.created_on,
                    is_favourite = excluded.is_favourite,
                    show_on_profile = excluded.show_on_profile,
                    fetched_at = excluded.fetched_at
                "#,
                params![
                    story.id,
                    story.title,
                    story.story,
                    story.image_url,
                    locations,
                    format_date(&story.visited_date),
                    story.created_on.to_rfc3339(),
                    story.is_favourite,
                    story.show_on_profile,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Every cached story, in no particular order
    pub fn get_all(&self) -> Result<Vec<StoryRecord>, CacheError> {
        let conn = self.db.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT
                id, title, story, image_url, visited_location_json,
                visited_date, created_on, is_favourite, show_on_profile
            FROM stories
            "#,
        )?;

        let mut rows = stmt.query([])?;
        let mut stories = Vec::new();

        while let Some(row) = rows.next()? {
            stories.push(Self::row_to_story(row)?);
        }

        Ok(stories)
    }

    /// Update one field of one story. Returns false when the id isn't cached.
    pub fn patch(&self, id: &str, patch: &StoryPatch) -> Result<bool, CacheError> {
        let conn = self.db.conn()?;

        // Column names come from the closed StoryPatch set, never from input
        let sql = format!("UPDATE stories SET {} = ?1 WHERE id = ?2", patch.column());
        let changed = conn.execute(&sql, params![patch.value()?, id])?;

        Ok(changed > 0)
    }

    /// Unix time of the most recent replace, `None` while empty
    pub fn last_fetched(&self) -> Result<Option<i64>, CacheError> {
        let conn = self.db.conn()?;
        let fetched = conn.query_row("SELECT MAX(fetched_at) FROM stories", [], |row| row.get(0))?;
        Ok(fetched)
    }

    pub fn count(&self) -> Result<usize, CacheError> {
        let conn = self.db.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Convert a database row to a StoryRecord
    fn row_to_story(row: &rusqlite::Row) -> Result<StoryRecord, CacheError> {
        let locations_json: String = row.get(4)?;
        let visited_date: String = row.get(5)?;
        let created_on: String = row.get(6)?;

        let visited_date = NaiveDate::parse_from_str(&visited_date, "%Y-%m-%d")
            .map_err(|e| CacheError::Decode(format!("visited_date {visited_date:?}: {e}")))?;
        let created_on = DateTime::parse_from_rfc3339(&created_on)
            .map_err(|e| CacheError::Decode(format!("created_on {created_on:?}: {e}")))?
            .with_timezone(&Utc);

        Ok(StoryRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            story: row.get(2)?,
            image_url: row.get(3)?,
            visited_location: serde_json::from_str(&locations_json)?,
            visited_date,
            created_on,
            is_favourite: row.get(7)?,
            show_on_profile: row.get(8)?,
        })
    }
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
