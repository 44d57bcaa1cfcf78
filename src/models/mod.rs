//! Data models for the Omnia time-series API.
//!
//! All models use snake_case field names; the request engine translates
//! to and from the API's camelCase wire convention.

mod primitives;
mod timeseries;

pub use primitives::{ApiVersion, AssetId, TimeSeriesId};
pub use timeseries::{
    DataPoint, DataPointValue, DataPoints, NewTimeSeries, TimeSeries, TimeSeriesPatch,
};
