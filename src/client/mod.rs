//! HTTP client and request engine for the Omnia time-series API.
//!
//! This module provides the main entry point [`OmniaClient`] together
//! with the paginated request engine that all API services build on.
//!
//! # Example
//!
//! ```no_run
//! use omnia_rs::{OmniaClient, ClientConfig};
//! use omnia_rs::auth::AuthConfig;
//!
//! # async fn example() -> omnia_rs::Result<()> {
//! let client = OmniaClient::new(
//!     ClientConfig::default(),
//!     AuthConfig::from_env()?,
//! )?;
//!
//! let series = client.time_series().list(None).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod http;
pub mod paginated;

pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use http::{OmniaClient, PageRequest};
pub use paginated::PaginatedStream;
pub(crate) use http::{to_parameter_map, ClientInner};
