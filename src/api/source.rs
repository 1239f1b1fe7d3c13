// SPDX-License-Identifier: MPL-2.0

use crate::api::ClientError;
use crate::api::types::{AdvancedFilter, NewStory, Session, StoryRecord, User};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Where story data comes from when the device is online.
///
/// `RemoteDataSource` talks to the Travel Book service; `FixtureDataSource`
/// answers from memory so the client can run without a backend. The choice is
/// made once at startup.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Exchange credentials for a bearer token. Does not install the token.
    async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError>;

    /// Install or drop the bearer token used by every other call.
    fn set_token(&self, token: Option<String>);

    async fn get_user(&self) -> Result<User, ClientError>;

    async fn list_stories(&self) -> Result<Vec<StoryRecord>, ClientError>;

    async fn search(&self, query: &str) -> Result<Vec<StoryRecord>, ClientError>;

    async fn advanced_search(&self, filter: &AdvancedFilter)
    -> Result<Vec<StoryRecord>, ClientError>;

    /// Both bounds inclusive.
    async fn filter_by_date(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StoryRecord>, ClientError>;

    async fn set_favourite(&self, id: &str, value: bool) -> Result<StoryRecord, ClientError>;

    async fn set_show_on_profile(&self, id: &str, value: bool)
    -> Result<StoryRecord, ClientError>;

    async fn add_story(&self, story: &NewStory) -> Result<StoryRecord, ClientError>;

    async fn edit_story(&self, id: &str, story: &NewStory) -> Result<StoryRecord, ClientError>;

    async fn delete_story(&self, id: &str) -> Result<(), ClientError>;

    /// Whether the backend answers at all. Used to seed the connectivity state.
    async fn ping(&self) -> bool;
}
