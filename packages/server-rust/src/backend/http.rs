//! Management API client over HTTPS.
//!
//! Implements the backend capability traits against the v2 REST API.
//! Authentication is either a static API key or OAuth client credentials;
//! OAuth access tokens are cached until shortly before they expire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tailnet_mcp_core::{
    Acl, Device, DeviceRoutes, DevicesResource, Key, KeysResource, PolicyFileResource,
    TailnetClient,
};
use tracing::debug;

use crate::config::{AppConfig, AuthConfig};

/// Cached tokens are refreshed this long before the server-side expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Failures talking to the management API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API answered with a non-success status.
    #[error("API error: {message}")]
    Status { status: StatusCode, message: String },
    /// The request could not be sent or the body could not be decoded.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Builds a [`ApiError::Status`] from a failed response body.
    ///
    /// Uses the API's `message` field when the body is a JSON error object,
    /// otherwise the raw body, otherwise the status reason.
    fn from_response(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: String,
        }

        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.message.is_empty() => parsed.message,
            _ if !body.trim().is_empty() => body.trim().to_string(),
            _ => status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_lowercase(),
        };

        Self::Status { status, message }
    }
}

/// Connection settings for [`HttpTailnetClient`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub tailnet: String,
    pub auth: AuthConfig,
    /// Per-request timeout of the underlying HTTP client.
    pub timeout: Duration,
}

impl From<&AppConfig> for BackendConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            tailnet: config.tailnet.clone(),
            auth: config.auth.clone(),
            timeout: Duration::from_millis(config.service.default_call_timeout_ms),
        }
    }
}

/// Production [`TailnetClient`].
pub struct HttpTailnetClient {
    devices: HttpDevices,
    policy_file: HttpPolicyFile,
    keys: HttpKeys,
}

impl HttpTailnetClient {
    /// Builds the client. No request is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be parsed or the HTTP client
    /// cannot be constructed.
    pub fn new(config: BackendConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(config.base_url));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("tailnet-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        let api = Arc::new(ApiTransport {
            http,
            base_url,
            tailnet: config.tailnet,
            auth: Authenticator::from(config.auth),
        });

        Ok(Self {
            devices: HttpDevices(Arc::clone(&api)),
            policy_file: HttpPolicyFile(Arc::clone(&api)),
            keys: HttpKeys(api),
        })
    }
}

impl TailnetClient for HttpTailnetClient {
    fn devices(&self) -> &dyn DevicesResource {
        &self.devices
    }

    fn policy_file(&self) -> &dyn PolicyFileResource {
        &self.policy_file
    }

    fn keys(&self) -> &dyn KeysResource {
        &self.keys
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

struct ApiTransport {
    http: reqwest::Client,
    base_url: Url,
    tailnet: String,
    auth: Authenticator,
}

enum Authenticator {
    ApiKey(String),
    OAuth {
        client_id: String,
        client_secret: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl From<AuthConfig> for Authenticator {
    fn from(auth: AuthConfig) -> Self {
        match auth {
            AuthConfig::ApiKey(key) => Self::ApiKey(key),
            AuthConfig::OAuth {
                client_id,
                client_secret,
            } => Self::OAuth {
                client_id,
                client_secret,
                cached: Mutex::new(None),
            },
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl ApiTransport {
    /// Joins `segments` onto `<base>/api/v2/`, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v2"])
            .extend(segments);
        Ok(url)
    }

    async fn bearer_token(&self) -> Result<String, ApiError> {
        match &self.auth {
            Authenticator::ApiKey(key) => Ok(key.clone()),
            Authenticator::OAuth {
                client_id,
                client_secret,
                cached,
            } => {
                let fresh = cached
                    .lock()
                    .as_ref()
                    .filter(|token| Instant::now() < token.refresh_at)
                    .map(|token| token.access_token.clone());
                if let Some(access_token) = fresh {
                    return Ok(access_token);
                }

                // The lock is released while the token request is in flight;
                // concurrent refreshes simply race and the last one wins.
                let token = self.fetch_token(client_id, client_secret).await?;
                *cached.lock() = Some(token.clone());
                Ok(token.access_token)
            }
        }
    }

    async fn fetch_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<CachedToken, ApiError> {
        let url = self.endpoint(&["oauth", "token"])?;
        debug!(%url, "requesting OAuth access token");

        let response = self
            .http
            .post(url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let body: TokenResponse = Self::decode(response).await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        Ok(CachedToken {
            access_token: body.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let token = self.bearer_token().await?;
        debug!(%url, "calling management API");

        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }
        Ok(response.json::<T>().await?)
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

struct HttpDevices(Arc<ApiTransport>);
struct HttpPolicyFile(Arc<ApiTransport>);
struct HttpKeys(Arc<ApiTransport>);

#[derive(Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct KeyList {
    #[serde(default)]
    keys: Vec<Key>,
}

#[async_trait]
impl DevicesResource for HttpDevices {
    async fn list_with_all_fields(&self) -> anyhow::Result<Vec<Device>> {
        let api = &self.0;
        let list: DeviceList = api
            .get_json(&["tailnet", &api.tailnet, "devices"], &[("fields", "all")])
            .await?;
        Ok(list.devices)
    }

    async fn get_with_all_fields(&self, device_id: &str) -> anyhow::Result<Device> {
        Ok(self
            .0
            .get_json(&["device", device_id], &[("fields", "all")])
            .await?)
    }

    async fn subnet_routes(&self, device_id: &str) -> anyhow::Result<DeviceRoutes> {
        Ok(self.0.get_json(&["device", device_id, "routes"], &[]).await?)
    }
}

#[async_trait]
impl PolicyFileResource for HttpPolicyFile {
    async fn get(&self) -> anyhow::Result<Acl> {
        let api = &self.0;
        Ok(api.get_json(&["tailnet", &api.tailnet, "acl"], &[]).await?)
    }
}

#[async_trait]
impl KeysResource for HttpKeys {
    async fn list(&self, all: bool) -> anyhow::Result<Vec<Key>> {
        let api = &self.0;
        let all = if all { "true" } else { "false" };
        let list: KeyList = api
            .get_json(&["tailnet", &api.tailnet, "keys"], &[("all", all)])
            .await?;
        Ok(list.keys)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
