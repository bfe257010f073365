//! Process settings resolved from environment variables.
//!
//! Settings are constructed once at startup via [`Settings::from_env`] and
//! are immutable afterwards. Base URLs are normalized (trimmed, trailing
//! slashes stripped) and must carry an `http://` or `https://` scheme.
//!
//! ## Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `SENTINEL_API_KEY` | Statically configured API key (skips trial minting) |
//! | `SENTINEL_API_BASE_URL` | Sentinel API base URL (`SENTINEL_BASE_URL` honored as legacy alias) |
//! | `SENTINEL_TOKEN_BASE_URL` | Token-issuing service base URL |
//! | `SENTINEL_TIMEOUT_SECONDS` | Request timeout (`SENTINEL_API_TIMEOUT_SECONDS` legacy alias) |
//! | `SENTINEL_CREDENTIALS_PATH` | Override for the cached credential file |
//! | `SENTINEL_NO_TRIAL` | Truthy value disables automatic trial minting |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Default Sentinel API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://sentinelsignal.io";

/// Default token-issuing service base URL.
pub const DEFAULT_TOKEN_BASE_URL: &str = "https://sentinel-signal-token-service-prod.fly.dev";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while resolving settings from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// A base URL is missing an `http://`/`https://` scheme or is otherwise
    /// unparsable.
    #[error("{name} must be an http(s) URL, got {value:?}")]
    InvalidBaseUrl {
        /// Name of the offending environment variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The timeout value did not parse as a number.
    #[error("{name} must be a number, got {value:?}")]
    InvalidTimeout {
        /// Name of the offending environment variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The timeout value parsed but is zero, negative, or not finite.
    #[error("{name} must be > 0")]
    NonPositiveTimeout {
        /// Name of the offending environment variable.
        name: &'static str,
    },

    /// No home directory could be determined for the default credential path.
    #[error("failed to determine home directory for the credential file")]
    NoHomeDir,
}

/// Immutable resolved configuration for one process invocation.
#[derive(Clone)]
pub struct Settings {
    /// Sentinel API base URL, normalized without a trailing slash.
    pub api_base_url: String,

    /// Token-issuing service base URL, normalized without a trailing slash.
    pub token_base_url: String,

    /// Statically configured API key, if any. Blank values are treated as
    /// absent during resolution.
    pub api_key: Option<SecretString>,

    /// Path of the cached trial credential file.
    pub credentials_path: PathBuf,

    /// When set, automatic trial minting is disabled.
    pub no_trial: bool,

    /// Per-request timeout.
    pub timeout: Duration,

    /// User-agent string sent on every outbound request.
    pub user_agent: String,
}

// Custom Debug implementation to avoid exposing the API key
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_base_url", &self.api_base_url)
            .field("token_base_url", &self.token_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("credentials_path", &self.credentials_path)
            .field("no_trial", &self.no_trial)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Settings {
    /// Creates settings with the given base URLs and defaults elsewhere.
    ///
    /// Both URLs are normalized: trimmed and stripped of trailing slashes.
    ///
    /// # Errors
    ///
    /// Returns an error if either URL lacks an `http://`/`https://` scheme
    /// or the default credential path cannot be determined.
    pub fn new(
        api_base_url: impl Into<String>,
        token_base_url: impl Into<String>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            api_base_url: normalize_base_url("SENTINEL_API_BASE_URL", &api_base_url.into())?,
            token_base_url: normalize_base_url("SENTINEL_TOKEN_BASE_URL", &token_base_url.into())?,
            api_key: None,
            credentials_path: default_credentials_path()?,
            no_trial: false,
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
        })
    }

    /// Resolves settings from the process environment.
    ///
    /// Unset or blank base URL and timeout variables fall back to their
    /// defaults; a blank `SENTINEL_API_KEY` is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a base URL is malformed, the timeout is not a
    /// positive number, or no home directory can be determined for the
    /// default credential path.
    pub fn from_env() -> Result<Self, SettingsError> {
        let api_base_url = env_or("SENTINEL_API_BASE_URL", Some("SENTINEL_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let token_base_url = env_or("SENTINEL_TOKEN_BASE_URL", None)
            .unwrap_or_else(|| DEFAULT_TOKEN_BASE_URL.to_string());

        let api_key = env_or("SENTINEL_API_KEY", None).map(SecretString::from);

        let credentials_path = match env_or("SENTINEL_CREDENTIALS_PATH", None) {
            Some(path) => PathBuf::from(path),
            None => default_credentials_path()?,
        };

        let no_trial = env_or("SENTINEL_NO_TRIAL", None)
            .as_deref()
            .is_some_and(is_truthy);

        let timeout = match env_or("SENTINEL_TIMEOUT_SECONDS", Some("SENTINEL_API_TIMEOUT_SECONDS"))
        {
            Some(raw) => parse_timeout("SENTINEL_TIMEOUT_SECONDS", &raw)?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_base_url: normalize_base_url("SENTINEL_API_BASE_URL", &api_base_url)?,
            token_base_url: normalize_base_url("SENTINEL_TOKEN_BASE_URL", &token_base_url)?,
            api_key,
            credentials_path,
            no_trial,
            timeout,
            user_agent: default_user_agent(),
        })
    }

    /// Sets the statically configured API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Sets the cached credential file path.
    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Enables or disables automatic trial minting.
    #[must_use]
    pub const fn with_no_trial(mut self, no_trial: bool) -> Self {
        self.no_trial = no_trial;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the statically configured API key if it is non-blank.
    #[must_use]
    pub fn static_api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().trim())
            .filter(|key| !key.is_empty())
    }
}

/// Reads an environment variable, honoring a legacy alias, returning a
/// trimmed non-empty value.
fn env_or(name: &str, legacy: Option<&str>) -> Option<String> {
    let read = |var: &str| {
        std::env::var(var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    read(name).or_else(|| legacy.and_then(read))
}

/// Normalizes a base URL: trims whitespace, validates the scheme, and
/// strips trailing slashes.
///
/// # Errors
///
/// Returns [`SettingsError::InvalidBaseUrl`] for empty values, unparsable
/// URLs, and non-http(s) schemes.
pub fn normalize_base_url(name: &'static str, raw: &str) -> Result<String, SettingsError> {
    let trimmed = raw.trim();
    let invalid = || SettingsError::InvalidBaseUrl {
        name,
        value: raw.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid());
    }

    let parsed = url::Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Interprets common truthy spellings: `1`, `true`, `yes`, `on`.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_timeout(name: &'static str, raw: &str) -> Result<Duration, SettingsError> {
    let seconds: f64 = raw.parse().map_err(|_| SettingsError::InvalidTimeout {
        name,
        value: raw.to_string(),
    })?;
    if seconds <= 0.0 {
        return Err(SettingsError::NonPositiveTimeout { name });
    }
    // Rejects NaN, infinities, and values too large for a Duration.
    Duration::try_from_secs_f64(seconds).map_err(|_| SettingsError::InvalidTimeout {
        name,
        value: raw.to_string(),
    })
}

/// Default credential file location, XDG-aware.
///
/// Uses `$XDG_CONFIG_HOME/sentinel-signal/credentials.json` when set,
/// falling back to `~/.config/sentinel-signal/credentials.json`.
fn default_credentials_path() -> Result<PathBuf, SettingsError> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .map(|base| base.join("sentinel-signal").join("credentials.json"))
        .ok_or(SettingsError::NoHomeDir)
}

fn default_user_agent() -> String {
    format!("sentinel-signal-mcp/{}", env!("CARGO_PKG_VERSION"))
}
