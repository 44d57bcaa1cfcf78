//! Time-series and data-point domain models.
//!
//! These types are the typed view over the raw items returned by the
//! request engine. The engine snake-cases all wire keys before handing
//! items over, so every model here (de)serializes with snake_case names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{AssetId, TimeSeriesId};
use crate::{case, Result};

/// Metadata for a single time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Series ID assigned by the API.
    pub id: TimeSeriesId,
    /// Name of the time series.
    pub name: String,
    /// Description of the time series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this is a step series (values hold until the next point).
    #[serde(default)]
    pub step: bool,
    /// Physical unit of measure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// ID of the asset this series belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    /// ID from another (external) system, provided by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// When the series was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    /// When the series was last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_time: Option<DateTime<Utc>>,
}

impl TimeSeries {
    /// Serialize into a JSON object with wire-format (camelCase) keys.
    pub fn dump_camel(&self) -> Result<Value> {
        Ok(case::to_camel(serde_json::to_value(self)?))
    }
}

/// Request body for creating a time series. Only `name` is mandatory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTimeSeries {
    /// Name of the time series.
    pub name: String,
    /// Description of the time series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this is a step series.
    pub step: bool,
    /// Physical unit of measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// ID of the asset this series belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    /// ID from another (external) system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl NewTimeSeries {
    /// Create a request body with the mandatory name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit of measure.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the owning asset.
    pub fn with_asset_id(mut self, asset_id: AssetId) -> Self {
        self.asset_id = Some(asset_id);
        self
    }

    /// Set the external ID.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Mark the series as a step series.
    pub fn step(mut self, step: bool) -> Self {
        self.step = step;
        self
    }
}

/// Partial update for a time series. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeSeriesPatch {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New step flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<bool>,
    /// New unit of measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// New owning asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    /// New external ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// The value of a single data point.
///
/// The API stores numeric as well as string-valued series; integers are
/// kept distinct from floats so callers can round-trip them losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataPointValue {
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Text(String),
}

impl From<i64> for DataPointValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for DataPointValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for DataPointValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl DataPointValue {
    /// Get the value as an `f64`, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

/// A single data point in a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Time of the observation.
    pub time: DateTime<Utc>,
    /// Observed value.
    pub value: DataPointValue,
    /// Status code of the observation (0 means good).
    #[serde(default)]
    pub status: i64,
}

impl DataPoint {
    /// Create a data point with good (zero) status.
    pub fn new(time: DateTime<Utc>, value: impl Into<DataPointValue>) -> Self {
        Self {
            time,
            value: value.into(),
            status: 0,
        }
    }

    /// Set the status code.
    pub fn with_status(mut self, status: i64) -> Self {
        self.status = status;
        self
    }
}

/// Data points retrieved from a single time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoints {
    /// ID of the series the points belong to.
    pub id: TimeSeriesId,
    /// Name of the series, if returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Physical unit of measure, if returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// The points, in ascending time order as returned by the API.
    #[serde(default)]
    pub datapoints: Vec<DataPoint>,
}

impl DataPoints {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    /// Whether the window contained no points.
    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    /// The earliest point in the window.
    pub fn first(&self) -> Option<&DataPoint> {
        self.datapoints.first()
    }

    /// The latest point in the window.
    pub fn last(&self) -> Option<&DataPoint> {
        self.datapoints.last()
    }

    /// Serialize into a JSON object with wire-format (camelCase) keys.
    pub fn dump_camel(&self) -> Result<Value> {
        Ok(case::to_camel(serde_json::to_value(self)?))
    }
}

impl<'a> IntoIterator for &'a DataPoints {
    type Item = &'a DataPoint;
    type IntoIter = std::slice::Iter<'a, DataPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.datapoints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_time_series_from_snake_item() {
        let item = json!({
            "id": "ts-1",
            "name": "PYSDK_TEST_SERIES",
            "description": "A test series",
            "step": false,
            "unit": "bar",
            "asset_id": "asset-9",
            "external_id": "ext-3",
            "created_time": "2019-10-14T09:46:49.606Z",
        });

        let ts: TimeSeries = serde_json::from_value(item).unwrap();
        assert_eq!(ts.id.as_str(), "ts-1");
        assert_eq!(ts.unit.as_deref(), Some("bar"));
        assert_eq!(ts.asset_id.as_ref().map(AssetId::as_str), Some("asset-9"));
        assert!(!ts.step);
    }

    #[test]
    fn test_dump_camel() {
        let ts = TimeSeries {
            id: TimeSeriesId::new("ts-1"),
            name: "series".into(),
            description: None,
            step: true,
            unit: None,
            asset_id: Some(AssetId::new("asset-9")),
            external_id: Some("ext-3".into()),
            created_time: None,
            changed_time: None,
        };

        let dumped = ts.dump_camel().unwrap();
        assert_eq!(dumped["assetId"], "asset-9");
        assert_eq!(dumped["externalId"], "ext-3");
        assert!(dumped.get("asset_id").is_none());
    }

    #[test]
    fn test_data_point_value_forms() {
        let int: DataPointValue = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(int, DataPointValue::Int(42));

        let float: DataPointValue = serde_json::from_value(json!(1.5)).unwrap();
        assert_eq!(float, DataPointValue::Float(1.5));

        let text: DataPointValue = serde_json::from_value(json!("on")).unwrap();
        assert_eq!(text, DataPointValue::Text("on".into()));

        assert_eq!(int.as_f64(), Some(42.0));
        assert_eq!(text.as_f64(), None);
    }

    #[test]
    fn test_data_points_accessors() {
        let dps: DataPoints = serde_json::from_value(json!({
            "id": "ts-1",
            "name": "series",
            "unit": "bar",
            "datapoints": [
                {"time": "2020-01-01T12:00:00Z", "value": 100, "status": 0},
                {"time": "2020-01-02T12:00:00Z", "value": 200, "status": 0},
                {"time": "2020-01-03T12:00:00Z", "value": 150, "status": 0},
            ],
        }))
        .unwrap();

        assert_eq!(dps.len(), 3);
        assert_eq!(dps.first().unwrap().value, DataPointValue::Int(100));
        assert_eq!(dps.last().unwrap().value, DataPointValue::Int(150));
    }

    #[test]
    fn test_new_time_series_body_skips_none() {
        let body = serde_json::to_value(NewTimeSeries::new("series").with_unit("bar")).unwrap();
        assert_eq!(body["name"], "series");
        assert_eq!(body["unit"], "bar");
        assert!(body.get("description").is_none());
        assert!(body.get("asset_id").is_none());
    }
}
