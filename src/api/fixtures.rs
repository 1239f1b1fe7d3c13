// SPDX-License-Identifier: MPL-2.0

use crate::api::ClientError;
use crate::api::source::DataSource;
use crate::api::types::{AdvancedFilter, NewStory, Session, StoryRecord, User};
use crate::query::filter;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::RwLock;

const FIXTURE_TOKEN: &str = "fixture-token";

/// In-memory stand-in for the service, for running the client without a
/// backend. Answers searches with the same semantics the offline path uses.
pub struct FixtureDataSource {
    stories: RwLock<Vec<StoryRecord>>,
    token: RwLock<Option<String>>,
    next_id: RwLock<u64>,
}

impl FixtureDataSource {
    pub fn new(stories: Vec<StoryRecord>) -> Self {
        let next_id = stories.len() as u64 + 1;
        Self {
            stories: RwLock::new(stories),
            token: RwLock::new(None),
            next_id: RwLock::new(next_id),
        }
    }

    /// A handful of sample entries.
    pub fn with_samples() -> Self {
        Self::new(sample_stories())
    }

    fn user() -> User {
        User {
            id: "fixture-user".to_string(),
            full_name: "Demo Traveller".to_string(),
            email: "demo@travelbook.local".to_string(),
        }
    }

    fn require_token(&self) -> Result<(), ClientError> {
        let guard = self
            .token
            .read()
            .map_err(|_| ClientError::NotAuthenticated)?;
        match guard.as_deref() {
            Some(FIXTURE_TOKEN) => Ok(()),
            Some(_) => Err(ClientError::Auth("unknown fixture token".into())),
            None => Err(ClientError::NotAuthenticated),
        }
    }

    fn snapshot(&self) -> Result<Vec<StoryRecord>, ClientError> {
        self.require_token()?;
        self.stories
            .read()
            .map(|s| s.clone())
            .map_err(|_| ClientError::InvalidResponse("fixture store poisoned".into()))
    }

    fn update<F>(&self, id: &str, apply: F) -> Result<StoryRecord, ClientError>
    where
        F: FnOnce(&mut StoryRecord),
    {
        self.require_token()?;
        let mut stories = self
            .stories
            .write()
            .map_err(|_| ClientError::InvalidResponse("fixture store poisoned".into()))?;
        let story = stories
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ClientError::Http {
                status: 404,
                message: "Travel story not found".into(),
            })?;
        apply(story);
        Ok(story.clone())
    }
}

#[async_trait]
impl DataSource for FixtureDataSource {
    async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Auth("Email and password are required".into()));
        }
        Ok(Session {
            access_token: FIXTURE_TOKEN.to_string(),
            user: User {
                email: email.to_string(),
                ..Self::user()
            },
        })
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    async fn get_user(&self) -> Result<User, ClientError> {
        self.require_token()?;
        Ok(Self::user())
    }

    async fn list_stories(&self) -> Result<Vec<StoryRecord>, ClientError> {
        let mut stories = self.snapshot()?;
        filter::sort_default(&mut stories);
        Ok(stories)
    }

    async fn search(&self, query: &str) -> Result<Vec<StoryRecord>, ClientError> {
        Ok(filter::search(self.snapshot()?, query))
    }

    async fn advanced_search(
        &self,
        criteria: &AdvancedFilter,
    ) -> Result<Vec<StoryRecord>, ClientError> {
        Ok(filter::advanced(self.snapshot()?, criteria))
    }

    async fn filter_by_date(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StoryRecord>, ClientError> {
        Ok(filter::by_date_range(self.snapshot()?, from, to))
    }

    async fn set_favourite(&self, id: &str, value: bool) -> Result<StoryRecord, ClientError> {
        self.update(id, |story| story.is_favourite = value)
    }

    async fn set_show_on_profile(
        &self,
        id: &str,
        value: bool,
    ) -> Result<StoryRecord, ClientError> {
        self.update(id, |story| story.show_on_profile = value)
    }

    async fn add_story(&self, story: &NewStory) -> Result<StoryRecord, ClientError> {
        self.require_token()?;
        let id = {
            let mut next = self
                .next_id
                .write()
                .map_err(|_| ClientError::InvalidResponse("fixture store poisoned".into()))?;
            let id = format!("fixture-{}", *next);
            *next += 1;
            id
        };
        let record = StoryRecord {
            id,
            title: story.title.clone(),
            story: story.story.clone(),
            image_url: story.image_url.clone(),
            visited_location: story.visited_location.clone(),
            visited_date: story.visited_date,
            created_on: Utc::now(),
            is_favourite: false,
            show_on_profile: false,
        };
        self.stories
            .write()
            .map_err(|_| ClientError::InvalidResponse("fixture store poisoned".into()))?
            .push(record.clone());
        Ok(record)
    }

    async fn edit_story(&self, id: &str, story: &NewStory) -> Result<StoryRecord, ClientError> {
        self.update(id, |existing| {
            existing.title = story.title.clone();
            existing.story = story.story.clone();
            existing.image_url = story.image_url.clone();
            existing.visited_location = story.visited_location.clone();
            existing.visited_date = story.visited_date;
        })
    }

    async fn delete_story(&self, id: &str) -> Result<(), ClientError> {
        self.require_token()?;
        let mut stories = self
            .stories
            .write()
            .map_err(|_| ClientError::InvalidResponse("fixture store poisoned".into()))?;
        let before = stories.len();
        stories.retain(|s| s.id != id);
        if stories.len() == before {
            return Err(ClientError::Http {
                status: 404,
                message: "Travel story not found".into(),
            });
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}

fn sample(
    id: &str,
    title: &str,
    story: &str,
    locations: &[&str],
    visited: (i32, u32, u32),
    favourite: bool,
) -> StoryRecord {
    let visited_date = NaiveDate::from_ymd_opt(visited.0, visited.1, visited.2).unwrap_or_default();
    StoryRecord {
        id: id.to_string(),
        title: title.to_string(),
        story: story.to_string(),
        image_url: format!("https://images.travelbook.local/{id}.jpg"),
        visited_location: locations.iter().map(|l| l.to_string()).collect(),
        visited_date,
        created_on: visited_date
            .and_hms_opt(18, 0, 0)
            .unwrap_or_default()
            .and_utc(),
        is_favourite: favourite,
        show_on_profile: favourite,
    }
}

fn sample_stories() -> Vec<StoryRecord> {
    vec![
        sample(
            "fixture-1",
            "Autumn in Kyoto",
            "Maple leaves along the Philosopher's Path and a tea ceremony in Gion.",
            &["Kyoto", "Nara"],
            (2023, 11, 18),
            true,
        ),
        sample(
            "fixture-2",
            "Paris Weekend",
            "Croissants, the Louvre at opening time and a late walk by the Seine.",
            &["Paris"],
            (2024, 4, 6),
            false,
        ),
        sample(
            "fixture-3",
            "Patagonia Trek",
            "Five days on the W circuit; wind that never stopped.",
            &["Torres del Paine", "Puerto Natales"],
            (2024, 1, 22),
            true,
        ),
        sample(
            "fixture-4",
            "Lisbon Food Tour",
            "Pasteis de nata in Belem and grilled sardines in Alfama.",
            &["Lisbon", "Belem"],
            (2024, 6, 13),
            false,
        ),
    ]
}
