//! Upstream data sources.
//!
//! Entity endpoints return `{ "entities": [...] }`; items are handed over as
//! raw JSON values so the mapper can validate each one on its own. Nothing
//! here retries: a failure surfaces as the feed's error state.

use async_trait::async_trait;
use civic_types::raw::{EntityEnvelope, RawRouteResponse};
use civic_types::{LngLat, Route, ValidationError};
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::mapper;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("invalid endpoint '{0}'")]
    InvalidUrl(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("could not decode payload from {origin}: {message}")]
    Decode { origin: String, message: String },

    #[error("could not read {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    InvalidRoute(#[from] ValidationError),
}

impl FetchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::Transport { .. } => "TRANSPORT",
            Self::Http { .. } => "HTTP_STATUS",
            Self::Decode { .. } => "DECODE",
            Self::Io { .. } => "IO",
            Self::InvalidRoute(_) => "INVALID_ROUTE",
        }
    }

    fn transport(url: &Url, err: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Something that yields one batch of raw entity records.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Human-readable origin for logs (URL, file path, ...).
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, FetchError>;
}

#[async_trait]
impl<T: EntitySource + ?Sized> EntitySource for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, FetchError> {
        (**self).fetch().await
    }
}

fn http_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Transport {
            url: String::new(),
            message: e.to_string(),
        })
}

fn endpoint(base: &str, path: &str) -> Result<Url, FetchError> {
    let base = Url::parse(base).map_err(|_| FetchError::InvalidUrl(base.to_string()))?;
    base.join(path)
        .map_err(|_| FetchError::InvalidUrl(format!("{}{}", base, path)))
}

// ============================================================================
// HTTP
// ============================================================================

/// GET `{base}{path}` and unwrap the `entities` envelope.
#[derive(Debug, Clone)]
pub struct HttpEntitySource {
    client: Client,
    url: Url,
}

impl HttpEntitySource {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: endpoint(base_url, path)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl EntitySource for HttpEntitySource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, FetchError> {
        tracing::debug!(url = %self.url, "fetching entities");
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| FetchError::transport(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: EntityEnvelope = response.json().await.map_err(|e| FetchError::Decode {
            origin: self.url.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(url = %self.url, count = envelope.entities.len(), "fetched entities");
        Ok(envelope.entities)
    }
}

/// Body of a route search request.
#[derive(Debug, Clone, Serialize)]
pub struct RouteQuery {
    pub start: LngLat,
    pub end: LngLat,
    pub algorithm: String,
}

/// POSTs a route search and validates the answer into a [`Route`].
#[derive(Debug, Clone)]
pub struct RouteClient {
    client: Client,
    url: Url,
}

impl RouteClient {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: endpoint(base_url, path)?,
        })
    }

    pub async fn find_route(&self, query: &RouteQuery) -> Result<Route, FetchError> {
        tracing::info!(url = %self.url, algorithm = %query.algorithm, "requesting route");
        let response = self
            .client
            .post(self.url.clone())
            .json(query)
            .send()
            .await
            .map_err(|e| FetchError::transport(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let raw: RawRouteResponse = response.json().await.map_err(|e| FetchError::Decode {
            origin: self.url.to_string(),
            message: e.to_string(),
        })?;
        Ok(mapper::to_route(&raw)?)
    }
}

/// Decode a route response document (as saved from the route endpoint).
pub fn parse_route(json: &str) -> Result<Route, FetchError> {
    let raw: RawRouteResponse = serde_json::from_str(json).map_err(|e| FetchError::Decode {
        origin: "route document".to_string(),
        message: e.to_string(),
    })?;
    Ok(mapper::to_route(&raw)?)
}

// ============================================================================
// STATIC
// ============================================================================

#[derive(Debug, Clone)]
enum StaticOrigin {
    Memory(Arc<Vec<serde_json::Value>>),
    File(PathBuf),
}

/// In-memory or file-backed payload. Files are re-read on every fetch.
#[derive(Debug, Clone)]
pub struct StaticSource {
    origin: StaticOrigin,
}

impl StaticSource {
    pub fn new(items: Vec<serde_json::Value>) -> Self {
        Self {
            origin: StaticOrigin::Memory(Arc::new(items)),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            origin: StaticOrigin::File(path.into()),
        }
    }

    /// Accepts either the `{ "entities": [...] }` envelope or a bare array.
    pub fn parse(json: &str, origin: &str) -> Result<Vec<serde_json::Value>, FetchError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| FetchError::Decode {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
        match value {
            serde_json::Value::Array(items) => Ok(items),
            other => {
                let envelope: EntityEnvelope =
                    serde_json::from_value(other).map_err(|e| FetchError::Decode {
                        origin: origin.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(envelope.entities)
            }
        }
    }

    async fn read_file(path: &Path) -> Result<Vec<serde_json::Value>, FetchError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FetchError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::parse(&text, &path.display().to_string())
    }
}

#[async_trait]
impl EntitySource for StaticSource {
    fn describe(&self) -> String {
        match &self.origin {
            StaticOrigin::Memory(items) => format!("memory ({} items)", items.len()),
            StaticOrigin::File(path) => path.display().to_string(),
        }
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, FetchError> {
        match &self.origin {
            StaticOrigin::Memory(items) => Ok(items.as_ref().clone()),
            StaticOrigin::File(path) => Self::read_file(path).await,
        }
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Keeps the first successful payload until [`invalidate`](Self::invalidate).
///
/// Owned by whoever constructs it (normally one feed); dropping the owner
/// drops the cache. Failures are never cached.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    cached: Mutex<Option<Arc<Vec<serde_json::Value>>>>,
}

impl<S: EntitySource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }

    pub fn invalidate(&self) {
        if self.slot().take().is_some() {
            tracing::debug!(source = %self.inner.describe(), "cache invalidated");
        }
    }

    pub fn is_cached(&self) -> bool {
        self.slot().is_some()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<Vec<serde_json::Value>>>> {
        self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<S: EntitySource> EntitySource for CachedSource<S> {
    fn describe(&self) -> String {
        format!("cached {}", self.inner.describe())
    }

    async fn fetch(&self) -> Result<Vec<serde_json::Value>, FetchError> {
        let hit = self.slot().clone();
        if let Some(items) = hit {
            tracing::trace!(source = %self.inner.describe(), "cache hit");
            return Ok(items.as_ref().clone());
        }
        let items = Arc::new(self.inner.fetch().await?);
        *self.slot() = Some(Arc::clone(&items));
        Ok(items.as_ref().clone())
    }
}
