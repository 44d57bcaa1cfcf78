//! Primitive types and newtypes for type-safe API interactions.
//!
//! This module provides strongly-typed wrappers around string identifiers
//! to prevent mixing up different types of IDs at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A strongly-typed time-series ID.
///
/// # Example
///
/// ```
/// use omnia_rs::TimeSeriesId;
///
/// let id = TimeSeriesId::new("f32a4b8e-1f1a-4a3c-8f8d-1b2c3d4e5f60");
/// println!("Series: {}", id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeriesId(String);

impl TimeSeriesId {
    /// Create a new time-series ID from a string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeSeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TimeSeriesId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for TimeSeriesId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TimeSeriesId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A strongly-typed asset ID.
///
/// Assets group related time series (for example the sensors on a single
/// piece of plant equipment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Create a new asset ID.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the asset ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// API version path segment, e.g. `v1.5`.
///
/// The time-series API versions its URL space with `v<major>.<minor>`
/// segments. This type ensures only valid version strings are used.
///
/// # Example
///
/// ```
/// use omnia_rs::ApiVersion;
///
/// let version = ApiVersion::new("v1.5").expect("valid version");
/// assert_eq!(version.as_str(), "v1.5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersion(String);

impl ApiVersion {
    /// Create a new API version, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not `v<major>.<minor>`.
    pub fn new(version: &str) -> crate::Result<Self> {
        let digits = version.strip_prefix('v').ok_or_else(|| {
            crate::Error::InvalidInput(format!(
                "Invalid API version format: {}. Expected v<major>.<minor>",
                version
            ))
        })?;

        let mut parts = digits.splitn(2, '.');
        let valid = matches!(
            (parts.next(), parts.next()),
            (Some(major), Some(minor))
                if major.parse::<u32>().is_ok() && minor.parse::<u32>().is_ok()
        );

        if !valid {
            return Err(crate::Error::InvalidInput(format!(
                "Invalid API version format: {}. Expected v<major>.<minor>",
                version
            )));
        }

        Ok(Self(version.to_string()))
    }

    /// Get the version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self("v1.5".to_string())
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
