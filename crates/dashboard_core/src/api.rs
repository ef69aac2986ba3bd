use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use shared::domain::{NewUser, User, UserId};
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BODY_PREVIEW_LIMIT: usize = 160;

/// Remote accessor for the users directory. One round trip per call; no
/// retries or caching at this layer.
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, ApiError>;
    async fn create(&self, draft: &NewUser) -> Result<User, ApiError>;
    async fn update(&self, user: &User) -> Result<User, ApiError>;
    async fn delete(&self, id: UserId) -> Result<(), ApiError>;
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    #[error("server returned {status}: {preview}")]
    Status { status: StatusCode, preview: String },
    #[error("invalid response body: {source}")]
    Decode {
        #[source]
        source: reqwest::Error,
    },
}

/// What to do with the id echoed by a successful create.
///
/// Demo backends (JSONPlaceholder among them) accept POSTs but answer
/// every create with the same placeholder id. `LocalClock` substitutes a
/// millisecond wall-clock value so the session can still address the new
/// record; real deployments keep the default and trust the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreatedIdPolicy {
    #[default]
    ServerAssigned,
    LocalClock,
}

#[derive(Debug, Clone)]
pub struct ApiOptions {
    pub base_url: Url,
    pub timeout: Duration,
    pub created_id_policy: CreatedIdPolicy,
    /// Ignore proxy settings from the environment. Off by default;
    /// loopback test servers turn this on so a configured proxy cannot
    /// swallow their traffic.
    pub no_proxy: bool,
}

impl ApiOptions {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            created_id_policy: CreatedIdPolicy::default(),
            no_proxy: false,
        }
    }
}

pub struct HttpUserApi {
    http: Client,
    base_url: String,
    created_id_policy: CreatedIdPolicy,
}

impl HttpUserApi {
    pub fn new(options: ApiOptions) -> Result<Self, ApiError> {
        let mut builder = Client::builder().timeout(options.timeout);
        if options.no_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build().map_err(transport)?;
        Ok(Self {
            http,
            base_url: options.base_url.as_str().trim_end_matches('/').to_string(),
            created_id_policy: options.created_id_policy,
        })
    }
}

#[async_trait]
impl UserApi for HttpUserApi {
    async fn list(&self) -> Result<Vec<User>, ApiError> {
        let response = self
            .http
            .get(format!("{}/users", self.base_url))
            .send()
            .await
            .map_err(transport)?;
        let users = check_status(response).await?.json().await.map_err(decode)?;
        Ok(users)
    }

    async fn create(&self, draft: &NewUser) -> Result<User, ApiError> {
        let response = self
            .http
            .post(format!("{}/users", self.base_url))
            .json(draft)
            .send()
            .await
            .map_err(transport)?;
        let mut created: User = check_status(response).await?.json().await.map_err(decode)?;
        if self.created_id_policy == CreatedIdPolicy::LocalClock {
            created.id = UserId(Utc::now().timestamp_millis());
        }
        Ok(created)
    }

    async fn update(&self, user: &User) -> Result<User, ApiError> {
        let response = self
            .http
            .put(format!("{}/users/{}", self.base_url, user.id.0))
            .json(user)
            .send()
            .await
            .map_err(transport)?;
        let updated = check_status(response).await?.json().await.map_err(decode)?;
        Ok(updated)
    }

    async fn delete(&self, id: UserId) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(format!("{}/users/{}", self.base_url, id.0))
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }
}

fn transport(source: reqwest::Error) -> ApiError {
    ApiError::Transport { source }
}

fn decode(source: reqwest::Error) -> ApiError {
    ApiError::Decode { source }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status,
        preview: body_preview(&body),
    })
}

/// Whitespace-compacted prefix of an error body, for logs.
fn body_preview(body: &str) -> String {
    let compact = body.split_whitespace().collect::<Vec<_>>().join(" ");
    compact.chars().take(BODY_PREVIEW_LIMIT).collect()
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
