//! Credential record and resolution types.
//!
//! A [`CredentialRecord`] is the JSON document persisted on disk after a
//! trial key is minted. [`ResolvedCredentials`] is the per-call, in-memory
//! result of resolution, tagged with the provenance of the key.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::settings::Settings;

/// Persisted credential record.
///
/// Deserialization requires `api_key`; everything else is optional and
/// unknown fields round-trip through `extra`, so records written by newer
/// versions survive a load/save cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The API key. A blank key makes the record unusable.
    pub api_key: String,

    /// RFC 3339 expiry timestamp (`Z` or offset form), if the key expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,

    /// Account identifier the key belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Upgrade URL advertised when trial quota runs out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_url: Option<String>,

    /// Plan limits advertised at mint time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Value>,

    /// API base URL the key was minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Token-issuer base URL the key was minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_base_url: Option<String>,

    /// Fields this version does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// Creates a record holding only an API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            expires_at: None,
            account_id: None,
            upgrade_url: None,
            limits: None,
            api_base_url: None,
            token_base_url: None,
            extra: Map::new(),
        }
    }

    /// Whether the record carries a non-blank API key.
    #[must_use]
    pub fn has_usable_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Whether the record is expired at `now`.
    ///
    /// A record without an expiry timestamp never expires by this check;
    /// an unparsable timestamp counts as expired so resolution fails safe
    /// toward re-minting.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Some(expires_at) = self.expires_at.as_deref().map(str::trim) else {
            return false;
        };
        if expires_at.is_empty() {
            return false;
        }
        match DateTime::parse_from_rfc3339(expires_at) {
            Ok(expiry) => expiry <= now,
            Err(err) => {
                log::debug!("treating unparsable expiry {expires_at:?} as expired: {err}");
                true
            }
        }
    }

    /// Whether the record is expired right now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the recorded base URLs match the given ones exactly, after
    /// trailing-slash normalization. Missing recorded bases never match,
    /// which forces a re-mint rather than reusing a key of unknown origin.
    #[must_use]
    pub fn bases_match(&self, api_base_url: &str, token_base_url: &str) -> bool {
        let strip = |s: &str| s.trim_end_matches('/').to_string();
        let cached_api = strip(self.api_base_url.as_deref().unwrap_or(""));
        let cached_token = strip(self.token_base_url.as_deref().unwrap_or(""));
        cached_api == strip(api_base_url) && cached_token == strip(token_base_url)
    }

    /// Stamps the record with the base URLs from `settings`, pinning the
    /// key to the environment it was minted for.
    pub fn stamp_bases(&mut self, settings: &Settings) {
        self.api_base_url = Some(settings.api_base_url.clone());
        self.token_base_url = Some(settings.token_base_url.clone());
    }
}

/// Provenance of a resolved credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Statically configured key from the environment.
    Env,
    /// Previously minted trial key read back from disk.
    Cache,
    /// Trial key minted during this resolution.
    Trial,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env => write!(f, "env"),
            Self::Cache => write!(f, "cache"),
            Self::Trial => write!(f, "trial"),
        }
    }
}

/// In-memory result of credential resolution, constructed fresh per call.
#[derive(Clone)]
pub struct ResolvedCredentials {
    /// The resolved API key; non-blank by construction.
    pub api_key: SecretString,

    /// Where the key came from.
    pub source: CredentialSource,

    /// Echo of the credential record (for cache/trial provenance) plus a
    /// `source` entry; used for diagnostics and error enrichment.
    pub metadata: Map<String, Value>,
}

// Custom Debug implementation to avoid exposing the API key
impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("api_key", &"[REDACTED]")
            .field("source", &self.source)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl ResolvedCredentials {
    /// Builds resolved credentials for a statically configured key.
    #[must_use]
    pub fn from_env_key(api_key: &str, settings: &Settings) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::from(CredentialSource::Env.to_string()));
        metadata.insert("api_base_url".into(), Value::from(settings.api_base_url.clone()));
        metadata.insert(
            "token_base_url".into(),
            Value::from(settings.token_base_url.clone()),
        );
        Self {
            api_key: SecretString::from(api_key.to_string()),
            source: CredentialSource::Env,
            metadata,
        }
    }

    /// Builds resolved credentials from a persisted or freshly minted
    /// record.
    ///
    /// The metadata echoes the record minus the key itself, which lives
    /// only in the `SecretString`.
    #[must_use]
    pub fn from_record(record: &CredentialRecord, source: CredentialSource) -> Self {
        let mut metadata = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        metadata.remove("api_key");
        metadata.insert("source".into(), Value::from(source.to_string()));
        Self {
            api_key: SecretString::from(record.api_key.clone()),
            source,
            metadata,
        }
    }

    /// Returns the resolved API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Returns the upgrade URL from the credential metadata, if present.
    #[must_use]
    pub fn upgrade_url(&self) -> Option<&str> {
        self.metadata.get("upgrade_url").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use chrono::Duration;

    use super::*;
    use crate::settings::{DEFAULT_API_BASE_URL, DEFAULT_TOKEN_BASE_URL};

    fn rfc3339_z(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    #[test]
    fn test_expiry_future_past_and_absent() {
        let now = Utc::now();

        let mut record = CredentialRecord::new("ss_trial_example");
        assert!(!record.is_expired_at(now));

        record.expires_at = Some(rfc3339_z(now + Duration::days(1)));
        assert!(!record.is_expired_at(now));

        record.expires_at = Some(rfc3339_z(now - Duration::days(1)));
        assert!(record.is_expired_at(now));
    }

    #[test]
    fn test_unparsable_expiry_counts_as_expired() {
        let mut record = CredentialRecord::new("ss_trial_example");
        record.expires_at = Some("not-a-date".to_string());
        assert!(record.is_expired_at(Utc::now()));

        // Blank timestamps are treated as absent, not malformed.
        record.expires_at = Some("   ".to_string());
        assert!(!record.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_expiry_accepts_offset_form() {
        let mut record = CredentialRecord::new("ss_trial_example");
        record.expires_at = Some("2099-01-01T00:00:00+02:00".to_string());
        assert!(!record.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_bases_match_ignores_trailing_slashes() {
        let mut record = CredentialRecord::new("ss_trial_example");
        record.api_base_url = Some("https://sentinelsignal.io/".to_string());
        record.token_base_url = Some(format!("{DEFAULT_TOKEN_BASE_URL}/"));

        assert!(record.bases_match(DEFAULT_API_BASE_URL, DEFAULT_TOKEN_BASE_URL));
        assert!(!record.bases_match("https://staging.sentinelsignal.io", DEFAULT_TOKEN_BASE_URL));
    }

    #[test]
    fn test_bases_missing_never_match() {
        let record = CredentialRecord::new("ss_trial_example");
        assert!(!record.bases_match(DEFAULT_API_BASE_URL, DEFAULT_TOKEN_BASE_URL));
    }

    #[test]
    fn test_record_round_trips_unknown_fields() {
        let raw = serde_json::json!({
            "api_key": "ss_trial_example",
            "expires_at": "2099-01-01T00:00:00Z",
            "issued_by": "token-service-7",
        });
        let record: CredentialRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.extra.get("issued_by").and_then(Value::as_str), Some("token-service-7"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back.get("issued_by").and_then(Value::as_str), Some("token-service-7"));
    }

    #[test]
    fn test_resolved_metadata_carries_source_and_upgrade_url() {
        let mut record = CredentialRecord::new("ss_trial_example");
        record.upgrade_url = Some("https://sentinelsignal.io/portal/dashboard".to_string());

        let resolved = ResolvedCredentials::from_record(&record, CredentialSource::Cache);
        assert_eq!(resolved.source, CredentialSource::Cache);
        assert_eq!(resolved.api_key(), "ss_trial_example");
        assert_eq!(
            resolved.metadata.get("source").and_then(Value::as_str),
            Some("cache")
        );
        assert_eq!(
            resolved.upgrade_url(),
            Some("https://sentinelsignal.io/portal/dashboard")
        );
    }

    #[test]
    fn test_resolved_debug_redacts_key() {
        let record = CredentialRecord::new("ss_trial_secret");
        let resolved = ResolvedCredentials::from_record(&record, CredentialSource::Trial);
        let rendered = format!("{resolved:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("ss_trial_secret"));
    }
}
