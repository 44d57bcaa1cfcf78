//! API service modules for the time-series endpoints.
//!
//! Each service provides methods for one resource of the API, built on
//! the paginated request engine in [`crate::client`].

mod timeseries;

pub use timeseries::{DataPointsQuery, TimeSeriesFilter, TimeSeriesService};
