//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - Direct commerce API base URL
//!
//! ## Optional
//! - `STOREFRONT_API_STYLE` - `rest` or `webhook` (default: rest)
//! - `STOREFRONT_WEBHOOK_PATH` - Webhook endpoint path (default: /webhook)
//! - `STOREFRONT_API_KEY` - Key sent on the direct channel (server-side use only)
//! - `STOREFRONT_API_KEY_HEADER` - Header carrying the key (default: x-api-key)
//! - `STOREFRONT_RUN_MODE` - `development` or `production` (default: production)
//! - `STOREFRONT_DEV_PROXY_URL` - Proxy tried first in development
//! - `STOREFRONT_PROXY_URL` - Proxy tried first in production
//! - `STOREFRONT_CACHE_TTL_SECS` - Product cache freshness window (default: 300)
//! - `STOREFRONT_COALESCE_GRACE_MS` - Delay before a settled read stops being shared (default: 100)
//! - `STOREFRONT_EMPTY_SHIPPING` - `place-order` or `report-success` (default: place-order)
//! - `STOREFRONT_COOKIE_FILE` - Cookie file used by the CLI (default: .market-lane/cookies.json)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_COALESCE_GRACE_MS: u64 = 100;
const DEFAULT_KEY_HEADER: &str = "x-api-key";
const DEFAULT_WEBHOOK_PATH: &str = "/webhook";
const DEFAULT_COOKIE_FILE: &str = ".market-lane/cookies.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which build of the storefront is running.
///
/// Selects the proxy channel to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    Development,
    #[default]
    Production,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("expected development or production, got {other:?}")),
        }
    }
}

/// How operations are encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStyle {
    /// One route per operation (`GET /products`, `POST /cart/items`, ...).
    Rest,
    /// Every operation is `POST {path}` with a `function` selector in the body.
    Webhook {
        /// Endpoint path, relative to the channel base URL.
        path: String,
    },
}

/// What the checkout does when an address submission returns no shipping
/// methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyShippingPolicy {
    /// Skip shipping selection and place the order immediately.
    #[default]
    PlaceOrder,
    /// Stay on the address stage and report the address as accepted.
    ReportSuccess,
}

impl FromStr for EmptyShippingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "place-order" | "place_order" => Ok(Self::PlaceOrder),
            "report-success" | "report_success" => Ok(Self::ReportSuccess),
            other => Err(format!(
                "expected place-order or report-success, got {other:?}"
            )),
        }
    }
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Direct commerce API base URL
    pub api_url: Url,
    /// Wire encoding of operations
    pub api_style: ApiStyle,
    /// Key sent on the direct channel (never set in browser-facing builds)
    pub api_key: Option<SecretString>,
    /// Header carrying `api_key`
    pub api_key_header: String,
    /// Current run mode
    pub run_mode: RunMode,
    /// Proxy tried first in development
    pub dev_proxy_url: Option<Url>,
    /// Proxy tried first in production
    pub proxy_url: Option<Url>,
    /// Product cache freshness window
    pub cache_ttl: Duration,
    /// How long a settled coalesced read keeps being shared
    pub coalesce_grace: Duration,
    /// Checkout behavior when no shipping methods are offered
    pub empty_shipping: EmptyShippingPolicy,
    /// Cookie file used by file-backed cookie stores
    pub cookie_file: PathBuf,
}

impl ClientConfig {
    /// Configuration with defaults for everything except the API URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            api_style: ApiStyle::Rest,
            api_key: None,
            api_key_header: DEFAULT_KEY_HEADER.to_string(),
            run_mode: RunMode::default(),
            dev_proxy_url: None,
            proxy_url: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            coalesce_grace: Duration::from_millis(DEFAULT_COALESCE_GRACE_MS),
            empty_shipping: EmptyShippingPolicy::default(),
            cookie_file: PathBuf::from(DEFAULT_COOKIE_FILE),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_url("STOREFRONT_API_URL", &get_required_env("STOREFRONT_API_URL")?)?;

        let api_style = match get_env_or_default("STOREFRONT_API_STYLE", "rest")
            .to_ascii_lowercase()
            .as_str()
        {
            "rest" => ApiStyle::Rest,
            "webhook" => ApiStyle::Webhook {
                path: get_env_or_default("STOREFRONT_WEBHOOK_PATH", DEFAULT_WEBHOOK_PATH),
            },
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "STOREFRONT_API_STYLE".to_string(),
                    format!("expected rest or webhook, got {other:?}"),
                ));
            }
        };

        let run_mode = parse_env("STOREFRONT_RUN_MODE", "production")?;
        let empty_shipping = parse_env("STOREFRONT_EMPTY_SHIPPING", "place-order")?;
        let cache_ttl = Duration::from_secs(parse_env(
            "STOREFRONT_CACHE_TTL_SECS",
            &DEFAULT_CACHE_TTL_SECS.to_string(),
        )?);
        let coalesce_grace = Duration::from_millis(parse_env(
            "STOREFRONT_COALESCE_GRACE_MS",
            &DEFAULT_COALESCE_GRACE_MS.to_string(),
        )?);

        Ok(Self {
            api_url,
            api_style,
            api_key: get_optional_env("STOREFRONT_API_KEY").map(SecretString::from),
            api_key_header: get_env_or_default("STOREFRONT_API_KEY_HEADER", DEFAULT_KEY_HEADER),
            run_mode,
            dev_proxy_url: get_optional_url("STOREFRONT_DEV_PROXY_URL")?,
            proxy_url: get_optional_url("STOREFRONT_PROXY_URL")?,
            cache_ttl,
            coalesce_grace,
            empty_shipping,
            cookie_file: PathBuf::from(get_env_or_default(
                "STOREFRONT_COOKIE_FILE",
                DEFAULT_COOKIE_FILE,
            )),
        })
    }

    /// The proxy configured for the current run mode, if any.
    #[must_use]
    pub const fn proxy_for_mode(&self) -> Option<&Url> {
        match self.run_mode {
            RunMode::Development => self.dev_proxy_url.as_ref(),
            RunMode::Production => self.proxy_url.as_ref(),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a URL-valued variable.
fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get an optional URL-valued variable.
fn get_optional_url(key: &str) -> Result<Option<Url>, ConfigError> {
    get_optional_env(key)
        .map(|value| parse_url(key, &value))
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(Url::parse("https://api.example-shop.test").unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.api_style, ApiStyle::Rest);
        assert_eq!(config.run_mode, RunMode::Production);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.coalesce_grace, Duration::from_millis(100));
        assert_eq!(config.empty_shipping, EmptyShippingPolicy::PlaceOrder);
        assert_eq!(config.api_key_header, "x-api-key");
    }

    #[test]
    fn test_proxy_for_mode() {
        let mut config = config();
        config.dev_proxy_url = Some(Url::parse("http://localhost:8787").unwrap());
        assert!(config.proxy_for_mode().is_none());

        config.run_mode = RunMode::Development;
        assert_eq!(
            config.proxy_for_mode().map(Url::as_str),
            Some("http://localhost:8787/")
        );
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("DEV".parse::<RunMode>().unwrap(), RunMode::Development);
        assert_eq!("production".parse::<RunMode>().unwrap(), RunMode::Production);
        assert!("staging".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_empty_shipping_parse() {
        assert_eq!(
            "report-success".parse::<EmptyShippingPolicy>().unwrap(),
            EmptyShippingPolicy::ReportSuccess
        );
        assert_eq!(
            "place_order".parse::<EmptyShippingPolicy>().unwrap(),
            EmptyShippingPolicy::PlaceOrder
        );
        assert!("ignore".parse::<EmptyShippingPolicy>().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = config();
        config.api_key = Some(SecretString::from("k3y-Zq81!vX"));
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("k3y-Zq81!vX"));
    }
}
