//! HTTP client implementation for the Omnia time-series API.
//!
//! The heart of this module is the paginated request engine: one logical
//! operation becomes one or more HTTP round trips, following the server's
//! continuation tokens until the data is exhausted or a requested limit
//! is reached.

use chrono::Duration;
use reqwest::header::{AUTHORIZATION, CONNECTION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

use crate::api::TimeSeriesService;
use crate::auth::{AuthConfig, TokenManager};
use crate::case;
use crate::client::paginated::RawPage;
use crate::{Error, Result};

use super::config::ClientConfig;

/// The main client for interacting with the Omnia time-series API.
///
/// The client owns the HTTP connection pool and the token manager, and
/// hands out service structs for the API's resources. It is cheap to
/// clone; clones share the connection pool and the credential slot.
///
/// # Example
///
/// ```no_run
/// use omnia_rs::{OmniaClient, ClientConfig};
/// use omnia_rs::auth::AuthConfig;
///
/// # async fn example() -> omnia_rs::Result<()> {
/// let auth = AuthConfig::with_secret(
///     "tenant-id",
///     "resource-id",
///     "client-id",
///     "client-secret",
/// )?;
/// let client = OmniaClient::new(ClientConfig::default(), auth)?;
///
/// let series = client.time_series().list(None).await?;
/// println!("found {} series", series.len());
/// # Ok(())
/// # }
/// ```
pub struct OmniaClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) tokens: TokenManager,
    pub(crate) config: ClientConfig,
}

/// A single logical API request.
///
/// Immutable per call; the engine only appends a continuation-token query
/// parameter between pages. The full request URL has the shape
/// `{base}/{resource}/{version}/{endpoint}/?{query}` with empty path
/// segments skipped.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// HTTP method.
    pub method: Method,
    /// API resource path, e.g. `plant/timeseries`.
    pub resource: String,
    /// API version path segment, e.g. `v1.5`.
    pub version: String,
    /// Resource endpoint, e.g. `{id}/data`. May be empty.
    pub endpoint: String,
    /// Flat query parameters with local (snake_case) keys; `None` values
    /// are dropped. A `limit` key caps the aggregated result size.
    pub parameters: Option<Map<String, Value>>,
    /// Request body with local (snake_case) keys.
    pub body: Option<Value>,
    /// Per-call deadline applied to each page round trip.
    pub timeout: Option<std::time::Duration>,
}

impl PageRequest {
    /// Create a request with no parameters or body.
    pub fn new(
        method: Method,
        resource: impl Into<String>,
        version: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            method,
            resource: resource.into(),
            version: version.into(),
            endpoint: endpoint.into(),
            parameters: None,
            body: None,
            timeout: None,
        }
    }

    /// Attach query parameters from any serializable struct. `None`
    /// fields serialized as null are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the value does not serialize to
    /// a flat JSON object.
    pub fn with_parameters<Q: Serialize>(mut self, parameters: &Q) -> Result<Self> {
        self.parameters = Some(to_parameter_map(parameters)?);
        Ok(self)
    }

    /// Attach a JSON body.
    pub fn with_body<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set a per-call deadline, applied to each page round trip and the
    /// token exchange it may trigger.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn limit(&self) -> Option<usize> {
        self.parameters
            .as_ref()
            .and_then(|p| p.get("limit"))
            .and_then(Value::as_u64)
            .map(|l| l as usize)
    }
}

/// Serialize a struct into a flat parameter map, dropping null values.
pub(crate) fn to_parameter_map<Q: Serialize>(parameters: &Q) -> Result<Map<String, Value>> {
    match serde_json::to_value(parameters)? {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(Error::InvalidInput(format!(
            "parameters must serialize to an object, got {}",
            other
        ))),
    }
}

impl OmniaClient {
    /// Create a client with explicit configuration.
    pub fn new(config: ClientConfig, auth: AuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let tokens = TokenManager::new(auth, http.clone());

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                tokens,
                config,
            }),
        })
    }

    /// Create a client configured from environment variables.
    ///
    /// See [`AuthConfig::from_env`] and [`ClientConfig::from_env`] for
    /// the variables read.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env(), AuthConfig::from_env()?)
    }

    /// Get the time-series service.
    pub fn time_series(&self) -> TimeSeriesService {
        TimeSeriesService::new(self.inner.clone())
    }

    /// Get a handle to the token manager sharing this client's
    /// credential slot.
    pub fn token_manager(&self) -> TokenManager {
        self.inner.tokens.clone()
    }

    /// Execute a raw request, following continuation tokens, and return
    /// the aggregated items with snake_case keys.
    ///
    /// This is the low-level escape hatch under the typed services; see
    /// [`PageRequest`] for how the URL is constructed.
    pub async fn execute(&self, request: PageRequest) -> Result<Vec<Value>> {
        self.inner.execute(request).await
    }
}

impl ClientInner {
    /// Fetch one page: a single HTTP round trip.
    ///
    /// Re-validates the credential before every page, so a paginated call
    /// that outlives its token picks up a fresh one instead of failing on
    /// a late page. The cached-token fast path costs no network I/O.
    pub(crate) async fn fetch_page(
        &self,
        request: &PageRequest,
        continuation: Option<&str>,
    ) -> Result<RawPage> {
        let credential = self
            .tokens
            .get_valid_token(Duration::seconds(self.config.refresh_buffer_secs))
            .await?;

        let url = self.url_for(request)?;
        let mut pairs = camel_query_pairs(request.parameters.as_ref());
        if let Some(token) = continuation {
            // The engine's token wins over any caller-supplied cursor.
            pairs.retain(|(k, _)| k != "continuationToken");
            pairs.push(("continuationToken".to_string(), token.to_string()));
        }

        tracing::debug!(method = %request.method, url = %url, "issuing request");

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", credential.bearer()))
            .header(CONNECTION, "keep-alive");

        if !pairs.is_empty() {
            builder = builder.query(&pairs);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .json(&case::to_camel(body.clone()));
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or_default();
            return Err(Error::from_api_response(status, body));
        }

        let mut body: Value = response.json().await?;
        let continuation_token = body
            .get("continuationToken")
            .and_then(Value::as_str)
            .map(String::from);

        let items = match body.pointer_mut("/data/items").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(Error::Protocol(
                    "response is missing the data.items payload".to_string(),
                ))
            }
        };

        Ok(RawPage {
            items,
            continuation_token,
        })
    }

    /// Execute a request end to end: follow continuation tokens,
    /// aggregate page items and return them with snake_case keys.
    ///
    /// The per-page unit of counting is data points when the first item
    /// carries a nested `datapoints` array, plain items otherwise. With a
    /// `limit` parameter, pagination stops at the first page boundary
    /// where the running count reaches the limit; item-counted results
    /// are truncated to exactly `limit`, data-point-counted results keep
    /// their final page whole (items are never split).
    pub(crate) async fn execute(&self, request: PageRequest) -> Result<Vec<Value>> {
        let limit = request.limit();
        let mut results: Vec<Value> = Vec::new();
        let mut count = 0usize;
        let mut points_mode: Option<bool> = None;
        let mut continuation: Option<String> = None;

        loop {
            let page = self.fetch_page(&request, continuation.as_deref()).await?;

            if page.items.is_empty() {
                break;
            }

            let counting_points = *points_mode.get_or_insert_with(|| {
                page.items[0]
                    .get("datapoints")
                    .is_some_and(Value::is_array)
            });

            count += if counting_points {
                page.items
                    .iter()
                    .filter_map(|item| item.get("datapoints").and_then(Value::as_array))
                    .map(Vec::len)
                    .sum()
            } else {
                page.items.len()
            };
            results.extend(page.items);

            match page.continuation_token {
                None => break,
                Some(token) => {
                    if limit.is_some_and(|limit| count >= limit) {
                        break;
                    }
                    tracing::debug!(token = %token, "fetching next page");
                    continuation = Some(token);
                }
            }
        }

        if let (Some(limit), Some(false)) = (limit, points_mode) {
            results.truncate(limit);
        }

        Ok(results.into_iter().map(case::to_snake).collect())
    }

    // Convenience verbs used by the services.

    pub(crate) async fn get(
        &self,
        resource: &str,
        version: &str,
        endpoint: &str,
        parameters: Option<Map<String, Value>>,
    ) -> Result<Vec<Value>> {
        let mut request = PageRequest::new(Method::GET, resource, version, endpoint);
        request.parameters = parameters;
        self.execute(request).await
    }

    pub(crate) async fn post(
        &self,
        resource: &str,
        version: &str,
        endpoint: &str,
        parameters: Option<Map<String, Value>>,
        body: Option<Value>,
    ) -> Result<Vec<Value>> {
        let mut request = PageRequest::new(Method::POST, resource, version, endpoint);
        request.parameters = parameters;
        request.body = body;
        self.execute(request).await
    }

    pub(crate) async fn patch(
        &self,
        resource: &str,
        version: &str,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Vec<Value>> {
        let mut request = PageRequest::new(Method::PATCH, resource, version, endpoint);
        request.body = body;
        self.execute(request).await
    }

    pub(crate) async fn delete(
        &self,
        resource: &str,
        version: &str,
        endpoint: &str,
        parameters: Option<Map<String, Value>>,
    ) -> Result<Vec<Value>> {
        let mut request = PageRequest::new(Method::DELETE, resource, version, endpoint);
        request.parameters = parameters;
        self.execute(request).await
    }

    fn url_for(&self, request: &PageRequest) -> Result<Url> {
        let path = [
            request.resource.as_str(),
            request.version.as_str(),
            request.endpoint.as_str(),
        ]
        .iter()
        .filter(|segment| !segment.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");

        let url = format!("{}/{}/", self.config.base_url.trim_end_matches('/'), path);
        Ok(Url::parse(&url)?)
    }
}

/// Translate parameters to the wire case convention and stringify values
/// for query encoding.
fn camel_query_pairs(parameters: Option<&Map<String, Value>>) -> Vec<(String, String)> {
    let Some(parameters) = parameters else {
        return Vec::new();
    };

    parameters
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (case::camel_key(k), value)
        })
        .collect()
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else if err.is_connect() {
        Error::Connection(err.to_string())
    } else {
        Error::Http(err)
    }
}

impl Clone for OmniaClient {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for OmniaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OmniaClient")
            .field("config", &self.inner.config)
            .finish()
    }
}
