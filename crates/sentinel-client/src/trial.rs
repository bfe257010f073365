//! Trial key minting.
//!
//! When no static key or usable cached credential exists, a trial key is
//! minted from the token-issuing service. The issuer is a trait so the
//! resolver can be exercised without a network.

use async_trait::async_trait;

use sentinel_common::{CredentialRecord, Settings};

use crate::client::parse_payload;
use crate::error::CredentialError;

/// Mints trial credentials from a token-issuing service.
#[async_trait]
pub trait TrialIssuer: Send + Sync {
    /// Mints a new trial credential, stamped with the base URLs it was
    /// minted for.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx response, a
    /// non-object response body, or a response missing a non-blank
    /// `api_key`.
    async fn mint(&self, settings: &Settings) -> Result<CredentialRecord, CredentialError>;
}

/// HTTP implementation of [`TrialIssuer`] against
/// `POST {token_base_url}/v1/keys/trial`.
#[derive(Debug, Clone)]
pub struct HttpTrialIssuer {
    http: reqwest::Client,
}

impl HttpTrialIssuer {
    /// Creates an issuer sharing an already-configured HTTP client
    /// (timeout and default headers come from the client).
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TrialIssuer for HttpTrialIssuer {
    async fn mint(&self, settings: &Settings) -> Result<CredentialRecord, CredentialError> {
        let url = format!("{}/v1/keys/trial", settings.token_base_url);
        log::info!("minting trial credential from {url}");

        let response =
            self.http
                .post(&url)
                .send()
                .await
                .map_err(|source| CredentialError::MintRequest {
                    url: url.clone(),
                    source,
                })?;

        let status = response.status();
        let payload = parse_payload(response).await;

        if !status.is_success() {
            return Err(CredentialError::MintRejected {
                status: status.as_u16(),
                body: payload.to_string(),
            });
        }

        if !payload.is_object() {
            return Err(CredentialError::MintResponseNotObject);
        }

        let mut record: CredentialRecord =
            serde_json::from_value(payload).map_err(|_| CredentialError::MintResponseMissingKey)?;
        if !record.has_usable_key() {
            return Err(CredentialError::MintResponseMissingKey);
        }

        record.stamp_bases(settings);
        Ok(record)
    }
}
