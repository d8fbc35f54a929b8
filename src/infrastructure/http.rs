//! Shared JSON-over-HTTP transport for the source adapters.
//!
//! A [`RestClient`] owns one reqwest client, one rate limiter and one
//! retry policy. Every attempt (including retries) takes a token from the
//! limiter before it is sent.

use std::fmt;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RateLimitConfig, RetryConfig};
use crate::services::rate_limiter::TokenBucketRateLimiter;

/// Notion API version sent with every board request.
pub const NOTION_VERSION: &str = "2022-06-28";

const USER_AGENT: &str = concat!("notion-issues/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Credentials attached to every request.
#[derive(Clone, Default)]
pub enum Auth {
    #[default]
    None,
    Bearer(String),
    Basic {
        user: String,
        password: String,
    },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Basic { user, .. } => write!(f, "Basic({user}:***)"),
        }
    }
}

/// A decoded successful response.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// `Value::Null` for an empty body.
    pub body: Value,
}

impl RestResponse {
    pub fn json<T: DeserializeOwned>(self) -> DomainResult<T> {
        Ok(serde_json::from_value(self.body)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Rate-limited, retrying JSON client rooted at one base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    name: &'static str,
    http: Client,
    base_url: String,
    auth: Auth,
    rate_limiter: TokenBucketRateLimiter,
    retry: RetryConfig,
}

impl RestClient {
    /// Build a client. `headers` are sent with every request.
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        auth: Auth,
        headers: &[(&'static str, &str)],
        rate_limit: &RateLimitConfig,
        retry: RetryConfig,
    ) -> DomainResult<Self> {
        let mut default_headers = HeaderMap::new();
        for (header, value) in headers {
            let value = HeaderValue::from_str(value).map_err(|e| {
                DomainError::ValidationFailed(format!("invalid value for header {header}: {e}"))
            })?;
            default_headers.insert(HeaderName::from_static(*header), value);
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name,
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            rate_limiter: TokenBucketRateLimiter::from_config(rate_limit),
            retry,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs (pagination links) pass through; paths are joined
    /// onto the base URL.
    pub fn url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}/{}", self.base_url, target.trim_start_matches('/'))
        }
    }

    /// Issue one call. Only idempotent methods are retried on transient
    /// failures; a 429 is retried for every method.
    pub async fn request(
        &self,
        method: Method,
        target: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> DomainResult<RestResponse> {
        let idempotent = method != Method::POST;
        self.send(method, target, query, body, idempotent).await
    }

    /// A POST that only reads (search and query endpoints), retried like
    /// a GET.
    pub async fn post_query(&self, target: &str, body: &Value) -> DomainResult<RestResponse> {
        self.send(Method::POST, target, &[], Some(body), true).await
    }

    pub async fn get(&self, target: &str, query: &[(String, String)]) -> DomainResult<RestResponse> {
        self.request(Method::GET, target, query, None).await
    }

    pub async fn post(&self, target: &str, body: &Value) -> DomainResult<RestResponse> {
        self.request(Method::POST, target, &[], Some(body)).await
    }

    pub async fn patch(&self, target: &str, body: &Value) -> DomainResult<RestResponse> {
        self.request(Method::PATCH, target, &[], Some(body)).await
    }

    pub async fn put(&self, target: &str, body: &Value) -> DomainResult<RestResponse> {
        self.request(Method::PUT, target, &[], Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        target: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        idempotent: bool,
    ) -> DomainResult<RestResponse> {
        let url = self.url(target);
        if self.retry.max_elapsed_ms == 0 {
            return self.send_once(&method, &url, query, body).await;
        }

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(self.retry.max_elapsed_ms)))
            .build();

        let method = &method;
        let url = url.as_str();
        let name = self.name;
        backoff::future::retry_notify(
            policy,
            move || async move {
                self.send_once(method, url, query, body).await.map_err(|err| {
                    if should_retry(&err, idempotent) {
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            },
            |err: DomainError, wait: Duration| {
                tracing::warn!(
                    client = name,
                    error = %err,
                    retry_in_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "transient failure, retrying"
                );
            },
        )
        .await
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> DomainResult<RestResponse> {
        self.rate_limiter.acquire().await;

        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        request = match &self.auth {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::trace!(client = self.name, method = %method, url, "sending request");
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(client = self.name, status = status.as_u16(), url, "request failed");
            return Err(DomainError::RemoteStatus {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(RestResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

fn should_retry(err: &DomainError, idempotent: bool) -> bool {
    match err {
        DomainError::RemoteStatus { status: 429, .. } => true,
        _ => idempotent && err.is_transient(),
    }
}
