// SPDX-License-Identifier: MPL-2.0

//! Unified story queries.
//!
//! Every query shape is answered by the remote service while online and by the
//! local story cache while offline, with the same filter and sort semantics on
//! both paths. Callers never branch on connectivity themselves.

pub mod filter;
mod stats;

pub use stats::{LocationCount, MonthCount, StoryStats};

use crate::api::{AdvancedFilter, ClientError, DataSource, NewStory, StoryRecord};
use crate::cache::{LocalStoryCache, StoryPatch};
use crate::state::{AppState, Notice};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{0}")]
    Validation(String),
    #[error("session expired, please sign in again")]
    SessionExpired,
    #[error("this action needs a network connection")]
    Offline,
    #[error("not signed in")]
    NotSignedIn,
    #[error(transparent)]
    Remote(ClientError),
}

/// The four read shapes the story list supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryQuery {
    All,
    Search(String),
    Advanced(AdvancedFilter),
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Remote,
    Cache,
}

/// Result of a query. `NotExecuted` is the neutral state; a completed query
/// with no stories is a real, empty answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    NotExecuted,
    Completed {
        stories: Vec<StoryRecord>,
        origin: DataOrigin,
    },
}

impl QueryOutcome {
    fn remote(stories: Vec<StoryRecord>) -> Self {
        Self::Completed {
            stories,
            origin: DataOrigin::Remote,
        }
    }

    fn cached(stories: Vec<StoryRecord>) -> Self {
        Self::Completed {
            stories,
            origin: DataOrigin::Cache,
        }
    }

    pub fn stories(&self) -> &[StoryRecord] {
        match self {
            Self::NotExecuted => &[],
            Self::Completed { stories, .. } => stories,
        }
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        match self {
            Self::NotExecuted => None,
            Self::Completed { origin, .. } => Some(*origin),
        }
    }

    /// The query ran and matched nothing.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Self::Completed { stories, .. } if stories.is_empty())
    }
}

/// Query executor shared by the front end and the reconnect sync.
pub struct StoryQueries {
    source: Arc<dyn DataSource>,
    cache: LocalStoryCache,
    state: Arc<AppState>,
}

impl StoryQueries {
    pub fn new(source: Arc<dyn DataSource>, cache: LocalStoryCache, state: Arc<AppState>) -> Self {
        Self {
            source,
            cache,
            state,
        }
    }

    pub fn cache(&self) -> &LocalStoryCache {
        &self.cache
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub async fn execute(&self, query: &StoryQuery) -> Result<QueryOutcome, QueryError> {
        match query {
            StoryQuery::All => self.all_stories().await,
            StoryQuery::Search(text) => self.search(text).await,
            StoryQuery::Advanced(filter) => self.advanced(filter).await,
            StoryQuery::DateRange { from, to } => self.date_range(*from, *to).await,
        }
    }

    /// Online: fetch everything and replace the cache with it.
    /// Offline: everything cached, in default order.
    pub async fn all_stories(&self) -> Result<QueryOutcome, QueryError> {
        if !self.state.is_online() {
            let mut stories = self.cache.get_all().await;
            filter::sort_default(&mut stories);
            return Ok(QueryOutcome::cached(stories));
        }

        let stories = self.remote(self.source.list_stories().await)?;
        self.cache.replace_all(&stories).await;
        Ok(QueryOutcome::remote(stories))
    }

    /// A blank query is not run.
    pub async fn search(&self, query: &str) -> Result<QueryOutcome, QueryError> {
        if query.trim().is_empty() {
            return Ok(QueryOutcome::NotExecuted);
        }

        if !self.state.is_online() {
            let mut stories = filter::search(self.cache.get_all().await, query);
            filter::sort_default(&mut stories);
            return Ok(QueryOutcome::cached(stories));
        }

        let stories = self.remote(self.source.search(query).await)?;
        Ok(QueryOutcome::remote(stories))
    }

    pub async fn advanced(&self, criteria: &AdvancedFilter) -> Result<QueryOutcome, QueryError> {
        if let Some(range) = &criteria.date_range {
            validate_order(range.start_date, range.end_date)?;
        }

        if !self.state.is_online() {
            let stories = filter::advanced(self.cache.get_all().await, criteria);
            return Ok(QueryOutcome::cached(stories));
        }

        let stories = self.remote(self.source.advanced_search(criteria).await)?;
        Ok(QueryOutcome::remote(stories))
    }

    /// Both bounds are required and inclusive.
    pub async fn date_range(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<QueryOutcome, QueryError> {
        let (Some(from), Some(to)) = (from, to) else {
            return Err(QueryError::Validation(
                "Select both a start and an end date".to_string(),
            ));
        };
        validate_order(Some(from), Some(to))?;

        if !self.state.is_online() {
            let mut stories = filter::by_date_range(self.cache.get_all().await, from, to);
            filter::sort_default(&mut stories);
            return Ok(QueryOutcome::cached(stories));
        }

        let stories = self.remote(self.source.filter_by_date(from, to).await)?;
        Ok(QueryOutcome::remote(stories))
    }

    /// Analytics over the same data "all stories" would return.
    pub async fn stats(&self) -> Result<StoryStats, QueryError> {
        let outcome = self.all_stories().await?;
        Ok(StoryStats::from_stories(outcome.stories()))
    }

    pub async fn set_favourite(&self, id: &str, value: bool) -> Result<StoryRecord, QueryError> {
        self.require_online()?;
        let story = self.remote(self.source.set_favourite(id, value).await)?;
        self.cache
            .patch_field(id, StoryPatch::IsFavourite(story.is_favourite))
            .await;
        Ok(story)
    }

    pub async fn set_show_on_profile(
        &self,
        id: &str,
        value: bool,
    ) -> Result<StoryRecord, QueryError> {
        self.require_online()?;
        let story = self.remote(self.source.set_show_on_profile(id, value).await)?;
        self.cache
            .patch_field(id, StoryPatch::ShowOnProfile(story.show_on_profile))
            .await;
        Ok(story)
    }

    /// The cache only learns about the new story on the next full refetch.
    pub async fn add_story(&self, story: &NewStory) -> Result<StoryRecord, QueryError> {
        validate_story(story)?;
        self.require_online()?;
        self.remote(self.source.add_story(story).await)
    }

    pub async fn edit_story(&self, id: &str, story: &NewStory) -> Result<StoryRecord, QueryError> {
        validate_story(story)?;
        self.require_online()?;
        self.remote(self.source.edit_story(id, story).await)
    }

    pub async fn delete_story(&self, id: &str) -> Result<(), QueryError> {
        self.require_online()?;
        self.remote(self.source.delete_story(id).await)
    }

    fn require_online(&self) -> Result<(), QueryError> {
        if self.state.is_online() {
            Ok(())
        } else {
            Err(QueryError::Offline)
        }
    }

    /// Auth failures become the session-expiry notice; everything else is
    /// surfaced as-is, never answered from the cache.
    fn remote<T>(&self, result: Result<T, ClientError>) -> Result<T, QueryError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_auth() => {
                tracing::warn!(error = %e, "remote call rejected, session expired");
                self.state.notify(Notice::SessionExpired);
                Err(QueryError::SessionExpired)
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote call failed");
                Err(QueryError::Remote(e))
            }
        }
    }
}

fn validate_order(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), QueryError> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(QueryError::Validation(
            "The start date must not be after the end date".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_story(story: &NewStory) -> Result<(), QueryError> {
    if story.title.trim().is_empty() {
        return Err(QueryError::Validation("Please enter a title".to_string()));
    }
    if story.story.trim().is_empty() {
        return Err(QueryError::Validation("Please enter the story".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RemoteDataSource;
    use crate::cache::broken_cache;
    use crate::query::filter::tests::story;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        queries: StoryQueries,
        _dir: TempDir,
    }

    fn harness_with(server: &MockServer, online: bool, cache: Option<LocalStoryCache>) -> Harness {
        let dir = TempDir::new().unwrap();
        let remote = RemoteDataSource::new(&server.uri(), Duration::from_secs(2)).unwrap();
        remote.set_token(Some("tok".into()));
        let cache =
            cache.unwrap_or_else(|| LocalStoryCache::open_at(&dir.path().join("cache.db"), "u1"));
        let state = Arc::new(AppState::new(online));
        Harness {
            queries: StoryQueries::new(Arc::new(remote), cache, state),
            _dir: dir,
        }
    }

    fn harness(server: &MockServer, online: bool) -> Harness {
        harness_with(server, online, None)
    }

    fn wire(story: &StoryRecord) -> serde_json::Value {
        serde_json::to_value(story).unwrap()
    }

    async fn forbid_all_calls(server: &MockServer) {
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(server)
            .await;
    }

    fn ids(outcome: &QueryOutcome) -> Vec<&str> {
        outcome.stories().iter().map(|s| s.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_online_all_stories_replaces_cache() {
        let server = MockServer::start().await;
        let fresh = story("new", "New", (2024, 5, 1), false);
        Mock::given(method("GET"))
            .and(path("/get-all-stories"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "stories": [wire(&fresh)] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, true);
        h.queries
            .cache()
            .replace_all(&[story("stale", "Stale", (2020, 1, 1), false)])
            .await;

        let outcome = h.queries.all_stories().await.unwrap();
        assert_eq!(outcome.origin(), Some(DataOrigin::Remote));
        assert_eq!(ids(&outcome), vec!["new"]);
        assert_eq!(h.queries.cache().get_all().await, vec![fresh]);
    }

    #[tokio::test]
    async fn test_offline_queries_never_touch_network() {
        let server = MockServer::start().await;
        forbid_all_calls(&server).await;

        let h = harness(&server, false);
        let mut paris = story("1", "Paris Trip", (2024, 1, 1), false);
        paris.story = "...".into();
        paris.visited_location = vec!["Paris".into(), "Lyon".into()];
        let mut tokyo = story("2", "Tokyo", (2024, 2, 1), false);
        tokyo.story = "saw Paris Hilton interview".into();
        tokyo.visited_location = vec!["Tokyo".into()];
        h.queries.cache().replace_all(&[paris, tokyo]).await;

        let all = h.queries.all_stories().await.unwrap();
        assert_eq!(all.origin(), Some(DataOrigin::Cache));
        assert_eq!(ids(&all), vec!["2", "1"]);

        let found = h.queries.search("paris").await.unwrap();
        assert_eq!(ids(&found), vec!["2", "1"]);

        let padded = h.queries.search("  lyon ").await.unwrap();
        assert_eq!(ids(&padded), vec!["1"]);

        let none = h.queries.search("berlin").await.unwrap();
        assert!(none.is_empty_result());

        let ranged = h
            .queries
            .date_range(NaiveDate::from_ymd_opt(2024, 1, 1), NaiveDate::from_ymd_opt(2024, 1, 1))
            .await
            .unwrap();
        assert_eq!(ids(&ranged), vec!["1"]);

        assert!(matches!(
            h.queries.set_favourite("1", true).await,
            Err(QueryError::Offline)
        ));
    }

    #[tokio::test]
    async fn test_offline_advanced_filter_reads_cache() {
        let server = MockServer::start().await;
        forbid_all_calls(&server).await;

        let h = harness(&server, false);
        h.queries
            .cache()
            .replace_all(&[
                story("b", "Banana Trip", (2024, 1, 1), false),
                story("a", "Apple Trip", (2023, 1, 1), false),
            ])
            .await;

        let outcome = h
            .queries
            .advanced(&AdvancedFilter {
                sort_by: Some(crate::api::SortBy::TitleAsc),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_blank_search_is_not_executed() {
        let server = MockServer::start().await;
        forbid_all_calls(&server).await;

        let h = harness(&server, true);
        let outcome = h.queries.search("   ").await.unwrap();
        assert_eq!(outcome, QueryOutcome::NotExecuted);
        assert!(!outcome.is_empty_result());
    }

    #[tokio::test]
    async fn test_date_range_validation_precedes_any_call() {
        let server = MockServer::start().await;
        forbid_all_calls(&server).await;

        let h = harness(&server, true);
        let d = NaiveDate::from_ymd_opt(2024, 1, 1);
        let earlier = NaiveDate::from_ymd_opt(2023, 1, 1);

        assert!(matches!(
            h.queries.date_range(d, None).await,
            Err(QueryError::Validation(_))
        ));
        assert!(matches!(
            h.queries.date_range(None, d).await,
            Err(QueryError::Validation(_))
        ));
        assert!(matches!(
            h.queries.date_range(d, earlier).await,
            Err(QueryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_online_failure_is_not_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, true);
        h.queries
            .cache()
            .replace_all(&[story("a", "Paris", (2024, 1, 1), false)])
            .await;

        let err = h.queries.search("paris").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Remote(ClientError::Http { status: 503, .. })
        ));
        assert!(h.queries.state().is_online());
    }

    #[tokio::test]
    async fn test_unauthorized_raises_session_expiry_once_per_operation() {
        let cases: Vec<(&str, &str)> = vec![
            ("GET", "/get-all-stories"),
            ("GET", "/search"),
            ("POST", "/advanced-search"),
            ("GET", "/travel-stories-filter"),
            ("PUT", "/update-is-favourite/s1"),
            ("PUT", "/toggle-show-on-profile/s1"),
        ];

        for (verb, route) in cases {
            let server = MockServer::start().await;
            Mock::given(method(verb))
                .and(path(route))
                .respond_with(ResponseTemplate::new(401))
                .expect(1)
                .mount(&server)
                .await;

            let h = harness(&server, true);
            let mut notices = h.queries.state().subscribe_notices();
            let d = NaiveDate::from_ymd_opt(2024, 1, 1);

            let result = match route {
                "/get-all-stories" => h.queries.all_stories().await.map(|_| ()),
                "/search" => h.queries.search("x").await.map(|_| ()),
                "/advanced-search" => h
                    .queries
                    .advanced(&AdvancedFilter::default())
                    .await
                    .map(|_| ()),
                "/travel-stories-filter" => h.queries.date_range(d, d).await.map(|_| ()),
                "/update-is-favourite/s1" => h.queries.set_favourite("s1", true).await.map(|_| ()),
                _ => h
                    .queries
                    .set_show_on_profile("s1", true)
                    .await
                    .map(|_| ()),
            };

            assert!(
                matches!(result, Err(QueryError::SessionExpired)),
                "{route}: {result:?}"
            );
            assert_eq!(notices.try_recv(), Ok(Notice::SessionExpired), "{route}");
            assert_eq!(notices.try_recv(), Err(TryRecvError::Empty), "{route}");
            server.verify().await;
        }
    }

    #[tokio::test]
    async fn test_cache_failure_does_not_fail_query() {
        let server = MockServer::start().await;
        let remote_story = story("r", "Remote", (2024, 1, 1), false);
        Mock::given(method("GET"))
            .and(path("/get-all-stories"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "stories": [wire(&remote_story)] })),
            )
            .mount(&server)
            .await;

        let broken_dir = TempDir::new().unwrap();
        let h = harness_with(&server, true, Some(broken_cache(&broken_dir)));

        let outcome = h.queries.all_stories().await.unwrap();
        assert_eq!(outcome.stories(), &[remote_story]);
    }

    #[tokio::test]
    async fn test_favourite_toggle_is_mirrored_into_cache() {
        let server = MockServer::start().await;
        let mut updated = story("s1", "Oslo", (2024, 1, 1), true);
        updated.show_on_profile = false;
        Mock::given(method("PUT"))
            .and(path("/update-is-favourite/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "story": wire(&updated) })))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, true);
        h.queries
            .cache()
            .replace_all(&[story("s1", "Oslo", (2024, 1, 1), false)])
            .await;

        h.queries.set_favourite("s1", true).await.unwrap();

        let cached = h.queries.cache().get_all().await;
        assert!(cached[0].is_favourite);
    }

    #[tokio::test]
    async fn test_add_story_validates_before_calling() {
        let server = MockServer::start().await;
        forbid_all_calls(&server).await;

        let h = harness(&server, true);
        let err = h
            .queries
            .add_story(&NewStory {
                title: " ".into(),
                story: "text".into(),
                image_url: String::new(),
                visited_location: Vec::new(),
                visited_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_offline_stats_use_cache() {
        let server = MockServer::start().await;
        forbid_all_calls(&server).await;

        let h = harness(&server, false);
        h.queries
            .cache()
            .replace_all(&[
                story("a", "A", (2024, 1, 1), true),
                story("b", "B", (2024, 2, 1), false),
            ])
            .await;

        let stats = h.queries.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.favourites, 1);
    }
}
