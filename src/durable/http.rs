//! Remote user store over HTTP.
//!
//! Talks to an account service with two routes:
//!
//! - `GET  {base}/users/{identity}` → `{"id": u64, "username": string}`
//! - `PUT  {base}/users/{identity}/online` with `{"online": bool}`
//!
//! Every request carries its own timeout; redirects are not followed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url, redirect};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, StoreError};

use super::{UserId, UserStore};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: UserId,
    username: String,
}

#[derive(Debug, Serialize)]
struct OnlineUpdate {
    online: bool,
}

/// [`UserStore`] backed by a remote account service.
#[derive(Debug, Clone)]
pub struct HttpUserStore {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpUserStore {
    /// Creates a store rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `base_url` is not an
    /// absolute http(s) URL, or if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let invalid = |expected: &str| ConfigError::InvalidValue {
            field: "store.url".to_string(),
            value: base_url.to_string(),
            expected: expected.to_string(),
        };

        let parsed = Url::parse(base_url).map_err(|_| invalid("an absolute URL"))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("an http or https URL"));
        }

        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| invalid(&format!("a usable HTTP client ({e})")))?;

        Ok(Self {
            client,
            base_url: parsed,
            timeout,
        })
    }

    /// Builds `{base}/users/{identity}[/{suffix}]` with each segment encoded.
    fn user_url(&self, identity: &str, suffix: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("users").push(identity);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url
    }

    async fn send(&self, identity: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
            .map_err(|e| StoreError::Network(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(identity.to_string())),
            status => Err(StoreError::HttpStatus(status.as_u16())),
        }
    }

    async fn fetch_user(&self, identity: &str) -> Result<UserRecord, StoreError> {
        let url = self.user_url(identity, None);
        debug!(%url, "fetching user");
        let response = self.send(identity, self.client.get(url)).await?;
        tokio::time::timeout(self.timeout, response.json::<UserRecord>())
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl UserStore for HttpUserStore {
    async fn get_user_id(&self, identity: &str) -> Result<UserId, StoreError> {
        self.fetch_user(identity).await.map(|u| u.id)
    }

    async fn get_username(&self, identity: &str) -> Result<String, StoreError> {
        self.fetch_user(identity).await.map(|u| u.username)
    }

    async fn set_online(&self, identity: &str, online: bool) -> Result<(), StoreError> {
        let url = self.user_url(identity, Some("online"));
        debug!(%url, online, "updating online flag");
        let request = self.client.put(url).json(&OnlineUpdate { online });
        self.send(identity, request).await.map(|_| ())
    }
}
