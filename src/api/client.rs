// SPDX-License-Identifier: MPL-2.0

use crate::api::source::DataSource;
use crate::api::types::{AdvancedFilter, NewStory, Session, StoryRecord, User, day_end, day_start};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// The service rejected our credential; the session is no longer usable.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::NotAuthenticated)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct StoriesEnvelope {
    stories: Vec<StoryRecord>,
}

#[derive(Deserialize)]
struct StoryEnvelope {
    story: StoryRecord,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginEnvelope {
    access_token: String,
    user: User,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the Travel Book service.
///
/// Wraps reqwest so the rest of the crate only sees our own types and errors.
pub struct RemoteDataSource {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl RemoteDataSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidResponse(format!("invalid base URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("travel-book/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidResponse("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let token = self
            .token
            .read()
            .map_err(|_| ClientError::NotAuthenticated)?
            .clone()
            .ok_or(ClientError::NotAuthenticated)?;
        let url = self.endpoint(segments)?;
        tracing::debug!(%method, %url, "remote call");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::InvalidResponse(e.to_string()));
        }

        let message = Self::error_message(response).await;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(ClientError::Auth(message))
        } else {
            Err(ClientError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn error_message(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            })
    }
}

#[async_trait]
impl DataSource for RemoteDataSource {
    async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let url = self.endpoint(&["login"])?;
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        // Rejected credentials; server trouble goes through decode as Http
        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST
                | StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::NOT_FOUND
        ) {
            return Err(ClientError::Auth(Self::error_message(response).await));
        }

        let envelope: LoginEnvelope = Self::decode(response).await?;

        Ok(Session {
            access_token: envelope.access_token,
            user: envelope.user,
        })
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    async fn get_user(&self) -> Result<User, ClientError> {
        let request = self.authed(Method::GET, &["get-user"])?;
        let envelope: UserEnvelope = self.send(request).await?;
        Ok(envelope.user)
    }

    async fn list_stories(&self) -> Result<Vec<StoryRecord>, ClientError> {
        let request = self.authed(Method::GET, &["get-all-stories"])?;
        let envelope: StoriesEnvelope = self.send(request).await?;
        Ok(envelope.stories)
    }

    async fn search(&self, query: &str) -> Result<Vec<StoryRecord>, ClientError> {
        let request = self
            .authed(Method::GET, &["search"])?
            .query(&[("query", query)]);
        let envelope: StoriesEnvelope = self.send(request).await?;
        Ok(envelope.stories)
    }

    async fn advanced_search(
        &self,
        filter: &AdvancedFilter,
    ) -> Result<Vec<StoryRecord>, ClientError> {
        let request = self.authed(Method::POST, &["advanced-search"])?.json(filter);
        let envelope: StoriesEnvelope = self.send(request).await?;
        Ok(envelope.stories)
    }

    async fn filter_by_date(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StoryRecord>, ClientError> {
        let request = self
            .authed(Method::GET, &["travel-stories-filter"])?
            .query(&[("startDate", day_start(from)), ("endDate", day_end(to))]);
        let envelope: StoriesEnvelope = self.send(request).await?;
        Ok(envelope.stories)
    }

    async fn set_favourite(&self, id: &str, value: bool) -> Result<StoryRecord, ClientError> {
        let request = self
            .authed(Method::PUT, &["update-is-favourite", id])?
            .json(&serde_json::json!({ "isFavourite": value }));
        let envelope: StoryEnvelope = self.send(request).await?;
        Ok(envelope.story)
    }

    async fn set_show_on_profile(
        &self,
        id: &str,
        value: bool,
    ) -> Result<StoryRecord, ClientError> {
        let request = self
            .authed(Method::PUT, &["toggle-show-on-profile", id])?
            .json(&serde_json::json!({ "showOnProfile": value }));
        let envelope: StoryEnvelope = self.send(request).await?;
        Ok(envelope.story)
    }

    async fn add_story(&self, story: &NewStory) -> Result<StoryRecord, ClientError> {
        let request = self.authed(Method::POST, &["add-travel-story"])?.json(story);
        let envelope: StoryEnvelope = self.send(request).await?;
        Ok(envelope.story)
    }

    async fn edit_story(&self, id: &str, story: &NewStory) -> Result<StoryRecord, ClientError> {
        let request = self.authed(Method::PUT, &["edit-story", id])?.json(story);
        let envelope: StoryEnvelope = self.send(request).await?;
        Ok(envelope.story)
    }

    async fn delete_story(&self, id: &str) -> Result<(), ClientError> {
        let request = self.authed(Method::DELETE, &["delete-story", id])?;
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        self.http.get(self.base_url.clone()).send().await.is_ok()
    }
}
