//! HTTP client for the webhook backend.
//!
//! Requests go through a [`Transport`] so the controller can be driven by
//! an in-memory backend in tests. The production transport wraps the
//! synchronous `ureq` client and runs each call on tokio's blocking pool,
//! which keeps the dashboard's event loop single-threaded and responsive
//! while a request is outstanding.
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::config::schema::ApiConfig;
use crate::error::DashboardError;
use crate::filter::ResolvedFilter;
use crate::model::{DashboardSummary, WebhookRecord};

use super::{parse_records, parse_summary};

/// A pending JSON GET.
pub type FetchFuture = BoxFuture<'static, Result<Value, DashboardError>>;

/// Something that can GET a URL and hand back its JSON body.
pub trait Transport: Send + Sync {
    fn get_json(&self, url: String) -> FetchFuture;
}

// ---------------------------------------------------------------------------
// ureq transport
// ---------------------------------------------------------------------------

/// Blocking `ureq` calls moved onto tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    timeout: Duration,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Transport for UreqTransport {
    fn get_json(&self, url: String) -> FetchFuture {
        let timeout = self.timeout;
        async move {
            tokio::task::spawn_blocking(move || blocking_get(&url, timeout))
                .await
                .map_err(|e| DashboardError::Transport(format!("request task failed: {e}")))?
        }
        .boxed()
    }
}

fn blocking_get(url: &str, timeout: Duration) -> Result<Value, DashboardError> {
    tracing::debug!(%url, "GET");
    match ureq::get(url).timeout(timeout).call() {
        Ok(resp) => resp
            .into_json::<Value>()
            .map_err(|e| DashboardError::Protocol(format!("invalid JSON body: {e}"))),
        Err(ureq::Error::Status(code, resp)) => {
            Err(DashboardError::Status(code, error_message(resp)))
        }
        Err(ureq::Error::Transport(t)) => Err(DashboardError::Transport(t.to_string())),
    }
}

/// The envelope's `message` from an error response, if the body has one.
fn error_message(resp: ureq::Response) -> Option<String> {
    let body = resp.into_json::<Value>().ok()?;
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Builds endpoint URLs and validates responses.
///
/// Cheap to clone; the returned futures own everything they need, so
/// several requests can be in flight while the caller keeps rendering.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    summary_path: String,
    records_path: String,
    cache_bust: bool,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("summary_path", &self.summary_path)
            .field("records_path", &self.records_path)
            .field("cache_bust", &self.cache_bust)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client backed by `ureq` from the resolved config.
    pub fn from_config(config: &ApiConfig) -> Self {
        let transport = UreqTransport::new(Duration::from_millis(config.request_timeout_ms));
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(config: &ApiConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            summary_path: config.summary_path.clone(),
            records_path: config.records_path.clone(),
            cache_bust: config.cache_bust,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Summary endpoint URL, with a `_=<millis>` cache buster when enabled.
    pub fn summary_url(&self) -> String {
        let url = format!("{}{}", self.base_url, self.summary_path);
        if self.cache_bust {
            format!("{url}?_={}", chrono::Utc::now().timestamp_millis())
        } else {
            url
        }
    }

    /// Records endpoint URL constrained to the filter's date bounds.
    pub fn records_url(&self, filter: &ResolvedFilter) -> String {
        let url = format!("{}{}", self.base_url, self.records_path);
        let query = filter.query();
        if query.is_empty() {
            url
        } else {
            format!("{url}?{query}")
        }
    }

    /// Fetch and validate the unfiltered dashboard summary.
    pub fn fetch_summary(&self) -> BoxFuture<'static, Result<DashboardSummary, DashboardError>> {
        let request = self.transport.get_json(self.summary_url());
        async move { parse_summary(request.await?) }.boxed()
    }

    /// Fetch and validate raw records within the filter's date bounds.
    pub fn fetch_records(
        &self,
        filter: &ResolvedFilter,
    ) -> BoxFuture<'static, Result<Vec<WebhookRecord>, DashboardError>> {
        let request = self.transport.get_json(self.records_url(filter));
        async move { parse_records(request.await?) }.boxed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
