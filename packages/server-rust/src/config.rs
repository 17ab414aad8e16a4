//! Application configuration: command-line flags with environment fallbacks,
//! credential mode selection, and validation.

use std::fmt;
use std::time::Duration;

use tailnet_mcp_core::validation::contains_forbidden_whitespace;

use crate::metrics::DEFAULT_WINDOW;
use crate::network::NetworkConfig;
use crate::service::ServiceConfig;

/// Default management API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.tailscale.com";

/// Port used when neither `--port` nor `PORT` is given.
pub const DEFAULT_PORT: &str = "8080";

/// Raw configuration inputs. Every flag can also be set from the environment.
#[derive(Clone, clap::Args)]
pub struct ConfigArgs {
    /// Tailnet to operate on (e.g. `example.com` or `example.ts.net`).
    #[arg(long, env = "TAILSCALE_TAILNET")]
    pub tailnet: Option<String>,

    /// API access token. Takes precedence over OAuth client credentials.
    #[arg(long, env = "TAILSCALE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OAuth client id.
    #[arg(long, env = "TAILSCALE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[arg(long, env = "TAILSCALE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Base URL of the management API.
    #[arg(long, env = "TAILSCALE_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// Address to bind the HTTP listener to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value = DEFAULT_PORT)]
    pub port: String,

    /// Overall HTTP request timeout in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Deadline for a single tool call in milliseconds.
    #[arg(long, env = "TOOL_TIMEOUT_MS", default_value_t = 25_000)]
    pub tool_timeout_ms: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 30)]
    pub shutdown_grace_secs: u64,

    /// Number of recent request latencies averaged by `/metrics`.
    #[arg(long, env = "METRICS_WINDOW", default_value_t = DEFAULT_WINDOW)]
    pub metrics_window: usize,

    /// Expose Prometheus metrics on this port when set.
    #[arg(long, env = "PROMETHEUS_PORT")]
    pub prometheus_port: Option<u16>,
}

/// How the backend client authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// Static API access token sent as a bearer token.
    ApiKey(String),
    /// OAuth client credentials exchanged for short-lived access tokens.
    OAuth {
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::OAuth { client_id, .. } => f
                .debug_struct("OAuth")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Validated configuration of the whole service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tailnet: String,
    pub auth: AuthConfig,
    pub api_base_url: String,
    pub network: NetworkConfig,
    pub service: ServiceConfig,
    pub metrics_window: usize,
    pub prometheus_port: Option<u16>,
}

/// Configuration problems detected before the server starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("TAILSCALE_TAILNET environment variable is required")]
    MissingTailnet,
    #[error("invalid port configuration: {0}")]
    InvalidPort(String),
    #[error("invalid tailnet configuration: {0}")]
    InvalidTailnet(String),
    #[error("TAILSCALE_CLIENT_SECRET environment variable is required when using OAuth")]
    MissingClientSecret,
    #[error(
        "either TAILSCALE_API_KEY or TAILSCALE_CLIENT_ID/TAILSCALE_CLIENT_SECRET environment variables are required"
    )]
    MissingCredentials,
    #[error("configuration validation failed: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Builds and validates the configuration from parsed flags.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found, checking the tailnet
    /// presence, then the port, then the tailnet format, then credentials.
    pub fn from_args(args: ConfigArgs) -> Result<Self, ConfigError> {
        let tailnet = non_empty(args.tailnet).ok_or(ConfigError::MissingTailnet)?;

        let port = if args.port.is_empty() {
            DEFAULT_PORT
        } else {
            args.port.as_str()
        };
        let port = validate_port(port)?;
        validate_tailnet(&tailnet)?;

        let auth = select_auth(
            non_empty(args.api_key),
            non_empty(args.client_id),
            non_empty(args.client_secret),
        )?;

        let config = Self {
            tailnet,
            auth,
            api_base_url: args.api_base_url,
            network: NetworkConfig {
                host: args.host,
                port,
                request_timeout: Duration::from_secs(args.request_timeout_secs),
                shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
                ..NetworkConfig::default()
            },
            service: ServiceConfig {
                default_call_timeout_ms: args.tool_timeout_ms,
            },
            metrics_window: args.metrics_window,
            prometheus_port: args.prometheus_port,
        };

        config.validate()?;
        Ok(config)
    }

    /// Final consistency checks on an assembled configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tailnet.is_empty() {
            return Err(ConfigError::Invalid("tailnet is empty".to_string()));
        }
        if self.api_base_url.is_empty() {
            return Err(ConfigError::Invalid("API base URL is empty".to_string()));
        }
        if self.service.default_call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "tool timeout must be greater than zero".to_string(),
            ));
        }
        if self.network.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn select_auth(
    api_key: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<AuthConfig, ConfigError> {
    if let Some(key) = api_key {
        return Ok(AuthConfig::ApiKey(key));
    }

    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => Ok(AuthConfig::OAuth {
            client_id,
            client_secret,
        }),
        (Some(_), None) => Err(ConfigError::MissingClientSecret),
        (None, _) => Err(ConfigError::MissingCredentials),
    }
}

/// Parses a listener port.
///
/// # Errors
///
/// [`ConfigError::InvalidPort`] when `port` is empty, not an integer, or
/// outside `0..=65535`.
pub fn validate_port(port: &str) -> Result<u16, ConfigError> {
    if port.is_empty() {
        return Err(ConfigError::InvalidPort("port cannot be empty".to_string()));
    }

    let number: i64 = port
        .parse()
        .map_err(|e| ConfigError::InvalidPort(format!("port must be a valid integer: {e}")))?;

    u16::try_from(number).map_err(|_| {
        ConfigError::InvalidPort(format!("port must be between 0 and 65535, got {number}"))
    })
}

/// Checks the tailnet name format.
///
/// # Errors
///
/// [`ConfigError::InvalidTailnet`] when the name is empty, shorter than 3
/// characters, contains whitespace, or contains `..`.
pub fn validate_tailnet(tailnet: &str) -> Result<(), ConfigError> {
    let reason = if tailnet.is_empty() {
        "tailnet cannot be empty"
    } else if tailnet.chars().count() < 3 {
        "tailnet must be at least 3 characters long"
    } else if contains_forbidden_whitespace(tailnet) {
        "tailnet contains invalid whitespace characters"
    } else if tailnet.contains("..") {
        "tailnet contains invalid '..' pattern"
    } else {
        return Ok(());
    };

    Err(ConfigError::InvalidTailnet(reason.to_string()))
}
