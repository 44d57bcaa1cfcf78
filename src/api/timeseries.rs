//! Time-series service: series metadata and data-point operations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::client::paginated::PaginatedStreamBuilder;
use crate::client::{to_parameter_map, ClientInner, PageRequest, PaginatedStream};
use crate::models::{
    ApiVersion, AssetId, DataPoint, DataPoints, NewTimeSeries, TimeSeries, TimeSeriesId,
    TimeSeriesPatch,
};
use crate::{Error, Result};

const RESOURCE_PATH: &str = "timeseries";

/// Service for time-series operations.
///
/// # Example
///
/// ```no_run
/// use omnia_rs::{TimeSeriesId, TimeSeriesFilter};
///
/// # async fn example(client: omnia_rs::OmniaClient) -> omnia_rs::Result<()> {
/// // List series on an asset
/// let filter = TimeSeriesFilter {
///     asset_id: Some("asset-9".into()),
///     ..Default::default()
/// };
/// for series in client.time_series().list(Some(filter)).await? {
///     println!("{}: {}", series.id, series.name);
/// }
///
/// // Fetch the latest data point of one series
/// let id = TimeSeriesId::new("ts-1");
/// let point = client.time_series().latest_data(&id, None).await?;
/// println!("{:?}", point);
/// # Ok(())
/// # }
/// ```
pub struct TimeSeriesService {
    inner: Arc<ClientInner>,
    version: ApiVersion,
}

/// Filter parameters for listing time series.
///
/// All recognized options are explicit fields; the request engine drops
/// `None` values and translates the names to the wire convention.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TimeSeriesFilter {
    /// Filter by series name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Filter by client-provided external ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Filter by owning asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    /// Limit the number of results, between 1-1000
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Skip the first `skip` results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    /// Continuation token to start from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Query parameters for retrieving data points in a time window.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DataPointsQuery {
    /// Inclusive start of the data window; defaults to 24 hours ago.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_wire_time"
    )]
    pub start_time: Option<DateTime<Utc>>,
    /// Non-inclusive end of the data window; defaults to now.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_wire_time"
    )]
    pub end_time: Option<DateTime<Utc>>,
    /// Limit of data points to retrieve, between 1-100000; the server
    /// defaults to 1000.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Include the points immediately before and after the window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_outside_points: Option<bool>,
}

impl TimeSeriesFilter {
    /// Build the flat parameter map handed to the request engine.
    fn to_parameters(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(name) = &self.name {
            map.insert("name".to_string(), Value::String(name.clone()));
        }
        if let Some(external_id) = &self.external_id {
            map.insert("external_id".to_string(), Value::String(external_id.clone()));
        }
        if let Some(asset_id) = &self.asset_id {
            map.insert(
                "asset_id".to_string(),
                Value::String(asset_id.as_str().to_string()),
            );
        }
        if let Some(limit) = self.limit {
            map.insert("limit".to_string(), Value::from(limit));
        }
        if let Some(skip) = self.skip {
            map.insert("skip".to_string(), Value::from(skip));
        }
        if let Some(token) = &self.continuation_token {
            map.insert(
                "continuation_token".to_string(),
                Value::String(token.clone()),
            );
        }
        map
    }
}

impl TimeSeriesService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self {
            inner,
            version: ApiVersion::default(),
        }
    }

    /// Pin the service to a specific API version.
    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    /// List time series, aggregating all pages.
    pub async fn list(&self, filter: Option<TimeSeriesFilter>) -> Result<Vec<TimeSeries>> {
        let parameters = filter.as_ref().map(TimeSeriesFilter::to_parameters);
        let items = self
            .inner
            .get(RESOURCE_PATH, self.version.as_str(), "", parameters)
            .await?;

        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Into::into))
            .collect()
    }

    /// Stream time series lazily, fetching pages on demand.
    ///
    /// More memory-efficient than [`list`](Self::list) for large result
    /// sets. A `continuation_token` in the filter selects the starting
    /// page; `limit` and `skip` are forwarded to the server per page.
    pub fn list_stream(&self, filter: Option<TimeSeriesFilter>) -> PaginatedStream<TimeSeries> {
        let mut request = PageRequest::new(Method::GET, RESOURCE_PATH, self.version.as_str(), "");
        request.parameters = filter.as_ref().map(TimeSeriesFilter::to_parameters);

        PaginatedStreamBuilder::new(self.inner.clone(), request).build()
    }

    /// Retrieve a single time series by ID.
    pub async fn retrieve(&self, id: &TimeSeriesId) -> Result<TimeSeries> {
        let items = self
            .inner
            .get(RESOURCE_PATH, self.version.as_str(), id.as_str(), None)
            .await?;
        single_item(items)
    }

    /// Retrieve multiple time series by ID.
    ///
    /// The API has no batch retrieval; this issues one request per ID and
    /// fails on the first error.
    pub async fn retrieve_multiple(&self, ids: &[TimeSeriesId]) -> Result<Vec<TimeSeries>> {
        let mut series = Vec::with_capacity(ids.len());
        for id in ids {
            series.push(self.retrieve(id).await?);
        }
        Ok(series)
    }

    /// Create a time series. Only the name is mandatory.
    pub async fn create(&self, new: NewTimeSeries) -> Result<TimeSeries> {
        let body = serde_json::to_value(&new)?;
        let items = self
            .inner
            .post(RESOURCE_PATH, self.version.as_str(), "", None, Some(body))
            .await?;
        single_item(items)
    }

    /// Update a time series. `None` fields in the patch are left unchanged.
    pub async fn update(&self, id: &TimeSeriesId, patch: TimeSeriesPatch) -> Result<TimeSeries> {
        let body = serde_json::to_value(&patch)?;
        let items = self
            .inner
            .patch(RESOURCE_PATH, self.version.as_str(), id.as_str(), Some(body))
            .await?;
        single_item(items)
    }

    /// Delete a time series.
    pub async fn delete(&self, id: &TimeSeriesId) -> Result<()> {
        self.inner
            .delete(RESOURCE_PATH, self.version.as_str(), id.as_str(), None)
            .await?;
        Ok(())
    }

    /// Retrieve data points in a time window.
    ///
    /// The window defaults to the last 24 hours when unset in the query.
    pub async fn data(&self, id: &TimeSeriesId, query: DataPointsQuery) -> Result<DataPoints> {
        let query = DataPointsQuery {
            end_time: query.end_time.or_else(|| Some(Utc::now())),
            start_time: query
                .start_time
                .or_else(|| Some(Utc::now() - Duration::days(1))),
            ..query
        };

        let items = self
            .inner
            .get(
                RESOURCE_PATH,
                self.version.as_str(),
                &format!("{}/data", id),
                Some(to_parameter_map(&query)?),
            )
            .await?;
        single_item(items)
    }

    /// Retrieve the first data point of a series, optionally only after
    /// the given time. Returns `None` when the series has no points past
    /// the bound.
    pub async fn first_data(
        &self,
        id: &TimeSeriesId,
        after_time: Option<DateTime<Utc>>,
    ) -> Result<Option<DataPoint>> {
        self.edge_data(id, "first", "after_time", after_time).await
    }

    /// Retrieve the latest data point of a series, optionally only
    /// before the given time. Returns `None` when the series has no
    /// points before the bound.
    pub async fn latest_data(
        &self,
        id: &TimeSeriesId,
        before_time: Option<DateTime<Utc>>,
    ) -> Result<Option<DataPoint>> {
        self.edge_data(id, "latest", "before_time", before_time)
            .await
    }

    /// Add or update data points on a series.
    ///
    /// With `asynch` set, the server only performs a permission check and
    /// commits the points in the background.
    pub async fn add_data(
        &self,
        id: &TimeSeriesId,
        points: &[DataPoint],
        asynch: bool,
    ) -> Result<()> {
        let mut parameters = Map::new();
        parameters.insert("async".to_string(), Value::Bool(asynch));

        let body = json!({ "datapoints": points });
        self.inner
            .post(
                RESOURCE_PATH,
                self.version.as_str(),
                &format!("{}/data", id),
                Some(parameters),
                Some(body),
            )
            .await?;
        Ok(())
    }

    /// Delete data points within a window: inclusive start, non-inclusive
    /// end. Unset bounds leave that side of the window open.
    pub async fn delete_data(
        &self,
        id: &TimeSeriesId,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut parameters = Map::new();
        if let Some(start) = start_time {
            parameters.insert("start_time".to_string(), Value::String(wire_time(&start)));
        }
        if let Some(end) = end_time {
            parameters.insert("end_time".to_string(), Value::String(wire_time(&end)));
        }

        self.inner
            .delete(
                RESOURCE_PATH,
                self.version.as_str(),
                &format!("{}/data", id),
                Some(parameters),
            )
            .await?;
        Ok(())
    }

    async fn edge_data(
        &self,
        id: &TimeSeriesId,
        which: &str,
        bound_key: &str,
        bound: Option<DateTime<Utc>>,
    ) -> Result<Option<DataPoint>> {
        let mut parameters = Map::new();
        if let Some(bound) = bound {
            parameters.insert(bound_key.to_string(), Value::String(wire_time(&bound)));
        }

        let items = self
            .inner
            .get(
                RESOURCE_PATH,
                self.version.as_str(),
                &format!("{}/data/{}", id, which),
                Some(parameters),
            )
            .await?;

        // An empty window is a domain condition, not a malformed response.
        let series: DataPoints = single_item(items)?;
        Ok(series.datapoints.into_iter().next())
    }
}

/// Deserialize the first (and only expected) item of a response.
fn single_item<T: DeserializeOwned>(mut items: Vec<Value>) -> Result<T> {
    if items.is_empty() {
        return Err(Error::Protocol(
            "expected a single item in response, got none".to_string(),
        ));
    }
    Ok(serde_json::from_value(items.remove(0))?)
}

/// Format a timestamp the way the API expects it, e.g.
/// `2019-10-14T09:46:49.606000Z`.
fn wire_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn serialize_wire_time<S: Serializer>(
    time: &Option<DateTime<Utc>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match time {
        Some(time) => serializer.serialize_str(&wire_time(time)),
        None => serializer.serialize_none(),
    }
}
