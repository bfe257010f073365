//! Error types for the Sentinel client.
//!
//! Two failure families cross this crate's boundary: credential
//! resolution failures ([`CredentialError`]) and upstream API failures
//! ([`ApiError`]). API errors carry a machine-readable code, an action
//! hint for the caller, and retry/upgrade details where the upstream
//! response provides them.

use std::fmt;
use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use sentinel_common::ResolvedCredentials;

/// Machine-readable remediation hint attached to an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// The plan's quota is exhausted; upgrading is the way forward.
    UpgradeRequired,
    /// The request was rate limited; the caller may retry after the
    /// suggested delay.
    RetryLater,
    /// Authentication failed; the static key or cached trial credential
    /// needs attention.
    ConfigureCredentials,
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpgradeRequired => write!(f, "upgrade_required"),
            Self::RetryLater => write!(f, "retry_later"),
            Self::ConfigureCredentials => write!(f, "configure_credentials"),
        }
    }
}

/// Structured error for a rejected or unreachable Sentinel API call.
///
/// Constructed only from a non-2xx response ([`ApiError::classify`]) or a
/// transport failure ([`ApiError::transport`]); never from a success.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable description.
    pub message: String,

    /// HTTP status code; absent for transport failures.
    pub status: Option<u16>,

    /// Machine-readable error code, upstream or synthesized.
    pub code: Option<String>,

    /// Remediation hint for the caller.
    pub action: Option<ErrorAction>,

    /// Suggested wait before retrying, in seconds.
    pub retry_after: Option<u64>,

    /// Upgrade URL, from the response body or the credential metadata.
    pub upgrade_url: Option<String>,

    /// Raw upstream payload, when one was readable.
    pub payload: Option<Value>,
}

impl ApiError {
    /// Wraps a transport-level failure (connection refused, timeout, DNS)
    /// with no status code.
    #[must_use]
    pub fn transport(err: &reqwest::Error) -> Self {
        Self {
            message: format!("HTTP request to Sentinel API failed: {err}"),
            status: None,
            code: None,
            action: None,
            retry_after: None,
            upgrade_url: None,
            payload: None,
        }
    }

    /// Classifies a non-2xx response into a structured error.
    ///
    /// `retry_after` is the raw `Retry-After` header value, if any. The
    /// resolved credentials supply the upgrade URL fallback for quota
    /// errors. This never panics on malformed payloads; missing fields
    /// degrade to a generic message.
    #[must_use]
    pub fn classify(
        status: StatusCode,
        retry_after: Option<&str>,
        payload: Value,
        credentials: &ResolvedCredentials,
    ) -> Self {
        let upstream = upstream_code(&payload);
        let mut message = extract_message(&payload, status);
        let mut code = upstream.clone();
        let mut action = None;
        let mut retry_after_seconds = None;
        let mut upgrade_url = None;

        match status.as_u16() {
            402 => {
                code = Some(match upstream.as_deref() {
                    None | Some("trial_quota_exhausted") => "quota_exhausted".to_string(),
                    Some(other) => other.to_string(),
                });
                action = Some(ErrorAction::UpgradeRequired);
                upgrade_url = body_upgrade_url(&payload)
                    .or_else(|| credentials.upgrade_url().map(str::to_string));
            }
            429 => {
                code = Some(upstream.unwrap_or_else(|| "rate_limited".to_string()));
                action = Some(ErrorAction::RetryLater);
                retry_after_seconds = parse_retry_after(retry_after);
            }
            401 | 403 => {
                code = Some(upstream.unwrap_or_else(|| "auth_failed".to_string()));
                action = Some(ErrorAction::ConfigureCredentials);
                message = format!(
                    "Sentinel API rejected the credential ({}); check SENTINEL_API_KEY \
                     or remove the cached trial credential and retry",
                    status.as_u16()
                );
            }
            _ => {}
        }

        Self {
            message,
            status: Some(status.as_u16()),
            code,
            action,
            retry_after: retry_after_seconds,
            upgrade_url,
            payload: Some(payload),
        }
    }
}

/// Errors raised while resolving or minting a credential.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// The mint request never reached the token service.
    #[error("failed to mint trial key from {url}: {source}")]
    MintRequest {
        /// The mint endpoint URL.
        url: String,
        /// The underlying transport error.
        source: reqwest::Error,
    },

    /// The token service rejected the mint request.
    #[error("trial key mint failed ({status}): {body}")]
    MintRejected {
        /// HTTP status of the rejection.
        status: u16,
        /// Response body, JSON or raw text.
        body: String,
    },

    /// The mint response body was not a JSON object.
    #[error("trial key response was not a JSON object")]
    MintResponseNotObject,

    /// The mint response carried no usable `api_key`.
    #[error("trial key response missing api_key")]
    MintResponseMissingKey,

    /// No static key is configured and auto-trial is disabled.
    #[error("SENTINEL_API_KEY is not set and auto-trial is disabled (SENTINEL_NO_TRIAL=1)")]
    TrialDisabled,

    /// A freshly minted credential could not be persisted.
    #[error("failed to write credential file {path}: {source}")]
    CacheWrite {
        /// The credential file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Umbrella error for Sentinel client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// No usable credential could be produced.
    #[error("credential resolution failed: {0}")]
    Credential(#[from] CredentialError),

    /// The Sentinel API rejected the call or could not be reached.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The HTTP client could not be constructed.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Returns the `error` or `detail` object nested in the payload, if the
/// payload has that shape.
fn error_object(payload: &Value) -> Option<&serde_json::Map<String, Value>> {
    let object = payload.as_object()?;
    object
        .get("error")
        .or_else(|| object.get("detail"))
        .and_then(Value::as_object)
}

/// Upstream machine-readable code, when the body carries one.
fn upstream_code(payload: &Value) -> Option<String> {
    error_object(payload)?
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extracts a human-readable message with a deterministic fallback chain:
/// nested `message`/`detail`/`error` string, then a top-level `detail`
/// string, then a generic statement of the status.
fn extract_message(payload: &Value, status: StatusCode) -> String {
    if let Some(nested) = error_object(payload) {
        for field in ["message", "detail", "error"] {
            if let Some(text) = nested.get(field).and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    return text.to_string();
                }
            }
        }
    }
    if let Some(detail) = payload.get("detail").and_then(Value::as_str) {
        if !detail.trim().is_empty() {
            return detail.to_string();
        }
    }
    format!("Sentinel API error {}", status.as_u16())
}

/// Upgrade URL from the response body, nested or top-level.
fn body_upgrade_url(payload: &Value) -> Option<String> {
    error_object(payload)
        .and_then(|nested| nested.get("upgrade_url"))
        .or_else(|| payload.get("upgrade_url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Parses a `Retry-After` header as a non-negative integer number of
/// seconds. HTTP-date forms and garbage yield `None`.
fn parse_retry_after(header: Option<&str>) -> Option<u64> {
    header?.trim().parse().ok()
}
