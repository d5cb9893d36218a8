//! HTTP transport for the backend's `{ success, data?, message? }` envelope.
//!
//! Reads are retried on transport errors and 5xx responses up to the
//! configured count; mutations are sent exactly once. A 401 from any request
//! drops the in-memory token and the stored session.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::session::{Session, SessionStore};

/// Header carrying the client-computed idempotency key on record creation.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "crate::models::default_true")]
    success: bool,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the school-bus REST API.
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base: Url,
    read_retries: u32,
    token: RwLock<Option<String>>,
    store: Option<SessionStore>,
}

impl ApiClient {
    /// Build a client from the `[api]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| Error::InvalidUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                url: config.base_url.clone(),
                message: "cannot be used as a base URL".to_string(),
            });
        }

        let http = Client::builder()
            .cookie_store(true)
            .user_agent(concat!("busctl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base,
            read_retries: config.read_retries,
            token: RwLock::new(None),
            store: None,
        })
    }

    /// Clear `store` whenever the backend rejects the session.
    #[must_use]
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use the token of `session` for subsequent requests, or none.
    pub fn set_session(&self, session: Option<&Session>) {
        if let Ok(mut token) = self.token.write() {
            *token = session.map(|s| s.token.clone());
        }
    }

    /// Whether a bearer token is currently attached.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    /// Absolute URL for `/api/<segments...>`, percent-encoding each segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the base URL cannot take path segments.
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl {
                url: self.base.to_string(),
                message: "cannot be used as a base URL".to_string(),
            })?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn on_unauthorized(&self) {
        if let Ok(mut token) = self.token.write() {
            *token = None;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to clear rejected session");
            }
        }
    }

    async fn execute<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        idempotency_key: Option<&str>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(segments)?;
        debug!(%method, %url, "Sending request");

        let mut request = self.http.request(method, url);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            if status == StatusCode::UNAUTHORIZED {
                self.on_unauthorized();
            }
            return Err(Error::api(status.as_u16(), message));
        }

        if bytes.is_empty() {
            return Ok(None);
        }

        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        if !envelope.success {
            return Err(Error::Rejected {
                message: envelope
                    .message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            });
        }
        Ok(envelope.data)
    }

    async fn read<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>> {
        let attempts = self.read_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .execute::<T, ()>(Method::GET, segments, None, None)
                .await
            {
                Err(e) if attempt < attempts && e.is_retryable() => {
                    warn!(
                        path = %segments.join("/"),
                        attempt,
                        error = %e,
                        "Read failed, retrying"
                    );
                }
                other => return other,
            }
        }
    }

    /// `GET` a resource that must exist.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP error, or [`Error::MissingData`] if the
    /// envelope is empty.
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.read(segments)
            .await?
            .ok_or_else(|| Error::MissingData {
                path: segments.join("/"),
            })
    }

    /// `GET` a resource that may be absent; 404 and empty data map to `None`.
    ///
    /// # Errors
    ///
    /// Returns any error other than 404.
    pub async fn get_optional<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>> {
        match self.read(segments).await {
            Err(e) if e.is_not_found() => Ok(None),
            other => other,
        }
    }

    /// `POST` a JSON body and return the created entity.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP error, or [`Error::MissingData`].
    pub async fn post<B, T>(&self, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, segments, Some(body), None)
            .await?
            .ok_or_else(|| Error::MissingData {
                path: segments.join("/"),
            })
    }

    /// `POST` with an `Idempotency-Key` header.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP error, or [`Error::MissingData`].
    pub async fn post_idempotent<B, T>(&self, segments: &[&str], body: &B, key: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, segments, Some(body), Some(key))
            .await?
            .ok_or_else(|| Error::MissingData {
                path: segments.join("/"),
            })
    }

    /// `POST` without a body, ignoring any response data.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP error.
    pub async fn post_empty(&self, segments: &[&str]) -> Result<()> {
        self.execute::<serde_json::Value, ()>(Method::POST, segments, None, None)
            .await
            .map(|_| ())
    }

    /// `PUT` a JSON body and return the updated entity.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP error, or [`Error::MissingData`].
    pub async fn put<B, T>(&self, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::PUT, segments, Some(body), None)
            .await?
            .ok_or_else(|| Error::MissingData {
                path: segments.join("/"),
            })
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP error.
    pub async fn delete(&self, segments: &[&str]) -> Result<()> {
        self.execute::<serde_json::Value, ()>(Method::DELETE, segments, None, None)
            .await
            .map(|_| ())
    }
}
