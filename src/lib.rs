//! # omnia-rs
//!
//! An async Rust client for the Omnia industrial time-series API.
//!
//! The crate wraps the API's REST surface with typed models and handles
//! the plumbing a caller should not have to think about: bearer-token
//! acquisition and caching, transparent pagination over continuation
//! tokens, and translation between the wire's camelCase keys and the
//! local snake_case data model.
//!
//! ## Features
//!
//! - **Authentication**: OAuth2 client-credentials and interactive
//!   device-code flows, with credential caching and refresh on expiry
//! - **Pagination**: eager aggregation or lazy `Stream`-based iteration
//!   over continuation-token pages
//! - **Type Safety**: strongly-typed series and data-point models
//! - **Async-first**: built on Tokio and reqwest
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omnia_rs::{OmniaClient, ClientConfig, TimeSeriesFilter};
//! use omnia_rs::auth::AuthConfig;
//!
//! #[tokio::main]
//! async fn main() -> omnia_rs::Result<()> {
//!     // Reads OMNIA_TENANT_ID, OMNIA_RESOURCE_ID, OMNIA_CLIENT_ID and
//!     // (optionally) OMNIA_CLIENT_SECRET.
//!     let client = OmniaClient::new(ClientConfig::default(), AuthConfig::from_env()?)?;
//!
//!     // List time series
//!     let filter = TimeSeriesFilter {
//!         name: Some("PT-1073".to_string()),
//!         ..Default::default()
//!     };
//!     let series = client.time_series().list(Some(filter)).await?;
//!     println!("Found {} series", series.len());
//!
//!     // Fetch the last day of data for the first match
//!     if let Some(ts) = series.first() {
//!         let data = client
//!             .time_series()
//!             .data(&ts.id, Default::default())
//!             .await?;
//!         println!("{} points", data.len());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Writing data
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use omnia_rs::{OmniaClient, DataPoint, NewTimeSeries};
//!
//! # async fn example(client: OmniaClient) -> omnia_rs::Result<()> {
//! let series = client
//!     .time_series()
//!     .create(NewTimeSeries::new("PT-1073").with_unit("bar"))
//!     .await?;
//!
//! let points = vec![
//!     DataPoint::new(Utc::now(), 101.3),
//!     DataPoint::new(Utc::now(), 101.9).with_status(0),
//! ];
//! client.time_series().add_data(&series.id, &points, false).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod case;
pub mod client;
pub mod error;
pub mod models;

// Re-export primary types at crate root for convenience
pub use api::{DataPointsQuery, TimeSeriesFilter, TimeSeriesService};
pub use client::{ClientConfig, OmniaClient, PageRequest, PaginatedStream};
pub use error::{Error, Result};
pub use models::{
    ApiVersion, AssetId, DataPoint, DataPointValue, DataPoints, NewTimeSeries, TimeSeries,
    TimeSeriesId, TimeSeriesPatch,
};

/// Prelude module for convenient imports.
///
/// ```rust
/// use omnia_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{DataPointsQuery, TimeSeriesFilter, TimeSeriesService};
    pub use crate::auth::{AuthConfig, Credential, TokenManager};
    pub use crate::client::{ClientConfig, OmniaClient, PageRequest, PaginatedStream};
    pub use crate::error::{Error, Result};
    pub use crate::models::{
        ApiVersion, AssetId, DataPoint, DataPointValue, DataPoints, NewTimeSeries, TimeSeries,
        TimeSeriesId, TimeSeriesPatch,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_series_id_creation() {
        let id = TimeSeriesId::new("ts-1");
        assert_eq!(id.as_str(), "ts-1");
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(
            ClientConfig::default().base_url,
            "https://api.gateway.equinor.com"
        );
    }

    #[test]
    fn test_api_version_validation() {
        assert!(ApiVersion::new("v1.5").is_ok());
        assert!(ApiVersion::new("1.5").is_err());
        assert!(ApiVersion::new("not-a-version").is_err());
    }
}
