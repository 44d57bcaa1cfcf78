//! Token management for the Omnia time-series API.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{Error, Result};

/// Default identity-provider host.
pub const DEFAULT_IDP_BASE_URL: &str = "https://login.microsoftonline.com";

/// A bearer credential issued by the identity provider.
///
/// Usable only while `now < expires_at`; the expiry always comes from the
/// provider's response, never from a local guess.
#[derive(Clone)]
pub struct Credential {
    /// The access token presented in the Authorization header.
    pub(crate) access_token: SecretString,
    /// Resource the token was issued for.
    pub resource_id: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// When the token stops being usable.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the credential is still usable at `now`, with `buffer`
    /// subtracted from the expiry to leave room for in-flight requests.
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now + buffer < self.expires_at
    }

    /// Whether the credential was issued for this resource/client pair.
    pub fn matches(&self, resource_id: &str, client_id: &str) -> bool {
        self.resource_id == resource_id && self.client_id == client_id
    }

    /// Expose the raw access token. Internal use only; never log this.
    pub(crate) fn bearer(&self) -> &str {
        self.access_token.expose_secret()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("resource_id", &self.resource_id)
            .field("client_id", &self.client_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity-provider configuration.
///
/// When `client_secret` is set the token manager performs an OAuth2
/// client-credentials exchange; when it is `None` the interactive
/// device-code flow is used instead.
#[derive(Clone)]
pub struct AuthConfig {
    /// Identity-provider host, e.g. `https://login.microsoftonline.com`.
    pub idp_base_url: String,
    /// Directory tenant the client lives in.
    pub tenant: String,
    /// Resource identifier to request tokens for.
    pub resource_id: String,
    /// Client identifier.
    pub client_id: String,
    /// Shared client secret. `None` selects the device-code flow.
    pub client_secret: Option<SecretString>,
}

impl AuthConfig {
    /// Create a configuration for the client-credentials flow.
    pub fn with_secret(
        tenant: impl Into<String>,
        resource_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        Self::build(
            tenant.into(),
            resource_id.into(),
            client_id.into(),
            Some(SecretString::from(client_secret.into())),
        )
    }

    /// Create a configuration for the interactive device-code flow.
    pub fn interactive(
        tenant: impl Into<String>,
        resource_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self> {
        Self::build(tenant.into(), resource_id.into(), client_id.into(), None)
    }

    /// Read the configuration from environment variables.
    ///
    /// Requires `OMNIA_TENANT_ID`, `OMNIA_RESOURCE_ID` and
    /// `OMNIA_CLIENT_ID`; `OMNIA_CLIENT_SECRET` is optional and selects
    /// the device-code flow when absent.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| Error::Config(format!("environment variable {} is not set", name)))
        };

        Self::build(
            var("OMNIA_TENANT_ID")?,
            var("OMNIA_RESOURCE_ID")?,
            var("OMNIA_CLIENT_ID")?,
            std::env::var("OMNIA_CLIENT_SECRET")
                .ok()
                .map(SecretString::from),
        )
    }

    /// Override the identity-provider host (used by tests with a local
    /// mock provider).
    pub fn with_idp_base_url(mut self, url: impl Into<String>) -> Self {
        self.idp_base_url = url.into();
        self
    }

    fn build(
        tenant: String,
        resource_id: String,
        client_id: String,
        client_secret: Option<SecretString>,
    ) -> Result<Self> {
        if tenant.is_empty() || resource_id.is_empty() || client_id.is_empty() {
            return Err(Error::Config(
                "tenant, resource_id and client_id must be non-empty".to_string(),
            ));
        }

        Ok(Self {
            idp_base_url: DEFAULT_IDP_BASE_URL.to_string(),
            tenant,
            resource_id,
            client_id,
            client_secret,
        })
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/token", self.idp_base_url, self.tenant)
    }

    fn device_code_url(&self) -> String {
        format!("{}/{}/oauth2/devicecode", self.idp_base_url, self.tenant)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("idp_base_url", &self.idp_base_url)
            .field("tenant", &self.tenant)
            .field("resource_id", &self.resource_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Obtains and caches the bearer credential used to authenticate API calls.
///
/// There is a single credential slot per manager, overwritten on every
/// refresh and never explicitly destroyed. The slot is guarded so that
/// concurrent callers never observe a half-updated credential and never
/// refresh redundantly.
///
/// # Thread Safety
///
/// `TokenManager` is `Clone` and designed to be shared across tasks;
/// clones share the same slot.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<RwLock<Option<Credential>>>,
    http: reqwest::Client,
    config: AuthConfig,
}

impl TokenManager {
    /// Create a token manager for the given identity-provider configuration.
    pub fn new(config: AuthConfig, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            http,
            config,
        }
    }

    /// Return a credential that is valid for at least `buffer` from now,
    /// refreshing it through the identity provider if necessary.
    ///
    /// A cached credential is reused without any network I/O when it was
    /// issued for the configured resource/client pair and has not expired.
    /// The whole check-then-refresh sequence runs under one write lock, so
    /// concurrent callers serialize on the slot instead of racing to
    /// refresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the identity-provider exchange
    /// fails for any reason; callers must not issue the API request.
    pub async fn get_valid_token(&self, buffer: Duration) -> Result<Credential> {
        let mut slot = self.inner.write().await;

        if let Some(credential) = slot.as_ref() {
            if credential.matches(&self.config.resource_id, &self.config.client_id)
                && credential.is_valid_at(Utc::now(), buffer)
            {
                tracing::debug!("current access token is still valid");
                return Ok(credential.clone());
            }
        }

        let credential = match &self.config.client_secret {
            Some(secret) => self.exchange_client_credentials(secret).await?,
            None => self.exchange_device_code().await?,
        };
        tracing::debug!(expires_at = %credential.expires_at, "acquired access token");

        *slot = Some(credential.clone());
        Ok(credential)
    }

    /// Drop any cached credential, forcing a refresh on the next call.
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }

    async fn exchange_client_credentials(&self, secret: &SecretString) -> Result<Credential> {
        let response = self
            .http
            .post(self.config.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("resource", &self.config.resource_id),
                ("client_id", &self.config.client_id),
                ("client_secret", secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("token request failed: {}", e)))?;

        Self::credential_from_response(response).await
    }

    /// Interactive device-code exchange.
    ///
    /// Blocks until the user completes the out-of-band authorization, the
    /// provider reports a terminal error, or the device code expires.
    async fn exchange_device_code(&self) -> Result<Credential> {
        let response = self
            .http
            .post(self.config.device_code_url())
            .form(&[
                ("resource", &self.config.resource_id),
                ("client_id", &self.config.client_id),
            ])
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("device code request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Authentication(format!(
                "device code request failed ({})",
                status
            )));
        }

        let device: DeviceCodeResponse = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("malformed device code response: {}", e)))?;

        // The provider's message tells the user where to enter the code.
        tracing::info!("{}", device.message);

        let mut interval = std::time::Duration::from_secs(device.interval.max(1));
        let deadline = Utc::now() + Duration::seconds(device.expires_in as i64);

        loop {
            tokio::time::sleep(interval).await;

            if Utc::now() >= deadline {
                return Err(Error::Authentication(
                    "device code expired before authorization was completed".to_string(),
                ));
            }

            let response = self
                .http
                .post(self.config.token_url())
                .form(&[
                    ("grant_type", "device_code"),
                    ("resource", &self.config.resource_id),
                    ("client_id", &self.config.client_id),
                    ("code", &device.device_code),
                ])
                .send()
                .await
                .map_err(|e| Error::Authentication(format!("token request failed: {}", e)))?;

            if response.status().is_success() {
                return Self::credential_from_response(response).await;
            }

            let body: serde_json::Value = response.json().await.unwrap_or_default();
            match body.get("error").and_then(|e| e.as_str()) {
                Some("authorization_pending") => continue,
                // RFC 8628: keep polling, at a longer interval.
                Some("slow_down") => {
                    interval += std::time::Duration::from_secs(5);
                    continue;
                }
                Some(error) => {
                    return Err(Error::Authentication(format!(
                        "device code authorization failed: {}",
                        error
                    )))
                }
                None => {
                    return Err(Error::Authentication(
                        "device code authorization failed".to_string(),
                    ))
                }
            }
        }
    }

    async fn credential_from_response(response: reqwest::Response) -> Result<Credential> {
        if !response.status().is_success() {
            let status = response.status();
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let detail = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("no error detail");
            return Err(Error::Authentication(format!(
                "token exchange failed ({}): {}",
                status, detail
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("malformed token response: {}", e)))?;

        Ok(Credential {
            access_token: SecretString::from(token.access_token),
            resource_id: token.resource,
            client_id: token.client_id,
            expires_at: token.expires_on,
        })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .finish()
    }
}

/// Token response from the identity provider:
/// `{accessToken, expiresOn, resource, clientId}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    #[serde(deserialize_with = "deserialize_expires_on")]
    expires_on: DateTime<Utc>,
    resource: String,
    client_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceCodeResponse {
    device_code: String,
    #[allow(dead_code)]
    user_code: String,
    #[allow(dead_code)]
    verification_url: String,
    expires_in: u64,
    interval: u64,
    message: String,
}

/// The provider reports expiry either as unix seconds (number or numeric
/// string) or as a `YYYY-MM-DD HH:MM:SS.f` timestamp.
fn deserialize_expires_on<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as DeError;

    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => {
            let secs = n
                .as_f64()
                .ok_or_else(|| DeError::custom("expiresOn is not a finite number"))?;
            DateTime::from_timestamp(secs as i64, 0)
                .ok_or_else(|| DeError::custom("expiresOn is out of range"))
        }
        serde_json::Value::String(s) => {
            if let Ok(secs) = s.parse::<f64>() {
                return DateTime::from_timestamp(secs as i64, 0)
                    .ok_or_else(|| DeError::custom("expiresOn is out of range"));
            }
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|e| DeError::custom(format!("unparseable expiresOn '{}': {}", s, e)))
        }
        _ => Err(DeError::custom("expiresOn must be a number or string")),
    }
}
