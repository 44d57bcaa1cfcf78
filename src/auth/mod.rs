//! Authentication and token management for the Omnia time-series API.
//!
//! Tokens come from an OAuth2 identity provider. Two flows are supported:
//!
//! 1. **Client credentials** (recommended for services) - a shared client
//!    secret is exchanged for a short-lived access token.
//! 2. **Device code** (interactive) - used when no secret is configured;
//!    the user authorizes the client out-of-band and the exchange blocks
//!    until they complete it.
//!
//! The acquired credential is cached and transparently refreshed once its
//! provider-issued expiry passes.
//!
//! ```no_run
//! use omnia_rs::auth::{AuthConfig, TokenManager};
//! use chrono::Duration;
//!
//! # async fn example() -> omnia_rs::Result<()> {
//! let config = AuthConfig::with_secret(
//!     "my-tenant-id",
//!     "my-resource-id",
//!     "my-client-id",
//!     std::env::var("OMNIA_CLIENT_SECRET").unwrap(),
//! )?;
//!
//! let manager = TokenManager::new(config, reqwest::Client::new());
//! let credential = manager.get_valid_token(Duration::zero()).await?;
//! println!("token valid until {}", credential.expires_at);
//! # Ok(())
//! # }
//! ```

mod token;

pub use token::{AuthConfig, Credential, TokenManager, DEFAULT_IDP_BASE_URL};
