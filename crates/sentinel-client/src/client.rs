//! Sentinel Signal API client.
//!
//! One method per remote operation. Each call resolves credentials,
//! attaches them as a bearer token, and maps any non-2xx response through
//! the classifier in [`crate::error`] so callers always see the same
//! structured error contract.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, Response};
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use sentinel_common::Settings;

use crate::error::{ApiError, ClientError};
use crate::resolver::CredentialResolver;
use crate::trial::HttpTrialIssuer;

/// Client for the Sentinel Signal scoring API.
#[derive(Clone)]
pub struct SentinelClient {
    http: reqwest::Client,
    settings: Settings,
    resolver: Arc<CredentialResolver>,
}

impl SentinelClient {
    /// Creates a client from resolved settings.
    ///
    /// The HTTP client carries the configured timeout, the user agent,
    /// and an `Accept: application/json` default header; the same client
    /// backs trial minting.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot
    /// be built.
    pub fn new(settings: Settings) -> Result<Self, ClientError> {
        let http = build_http(&settings)?;
        let resolver = Arc::new(CredentialResolver::new(Arc::new(HttpTrialIssuer::new(
            http.clone(),
        ))));
        Ok(Self {
            http,
            settings,
            resolver,
        })
    }

    /// Creates a client with an externally supplied resolver.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot
    /// be built.
    pub fn with_resolver(
        settings: Settings,
        resolver: Arc<CredentialResolver>,
    ) -> Result<Self, ClientError> {
        let http = build_http(&settings)?;
        Ok(Self {
            http,
            settings,
            resolver,
        })
    }

    /// Returns the settings this client was built from.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Submits a workflow scoring request (`POST /v1/score`).
    ///
    /// # Errors
    ///
    /// Returns an error when credential resolution fails or the API
    /// rejects or cannot receive the call.
    pub async fn score_workflow(
        &self,
        workflow: &str,
        payload: Value,
        options: Option<Value>,
    ) -> Result<Value, ClientError> {
        let mut body = json!({
            "workflow": workflow,
            "payload": payload,
        });
        if let (Some(object), Some(options)) = (body.as_object_mut(), options) {
            object.insert("options".to_string(), options);
        }
        self.request(Method::POST, "/v1/score", &[], Some(&body))
            .await
    }

    /// Fetches plan limits for the resolved key (`GET /v1/limits`).
    ///
    /// # Errors
    ///
    /// Returns an error when credential resolution fails or the API
    /// rejects or cannot receive the call.
    pub async fn get_limits(&self) -> Result<Value, ClientError> {
        self.request(Method::GET, "/v1/limits", &[], None).await
    }

    /// Fetches usage for the resolved key (`GET /v1/usage`), optionally
    /// scoped to a `YYYY-MM` month. A blank month is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error when credential resolution fails or the API
    /// rejects or cannot receive the call.
    pub async fn get_usage(&self, month: Option<&str>) -> Result<Value, ClientError> {
        let query: Vec<(&str, &str)> = month
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| ("month", m))
            .into_iter()
            .collect();
        self.request(Method::GET, "/v1/usage", &query, None).await
    }

    /// Submits structured feedback for a prior scoring request
    /// (`POST /v1/feedback`).
    ///
    /// # Errors
    ///
    /// Returns an error when credential resolution fails or the API
    /// rejects or cannot receive the call.
    pub async fn submit_feedback(&self, feedback: Value) -> Result<Value, ClientError> {
        self.request(Method::POST, "/v1/feedback", &[], Some(&feedback))
            .await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let credentials = self.resolver.resolve(&self.settings).await?;

        let url = format!("{}{path}", self.settings.api_base_url);
        log::debug!("{method} {url} (credential source: {})", credentials.source);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(credentials.api_key.expose_secret());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ApiError::transport(&err))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let payload = parse_payload(response).await;

        if status.is_success() {
            Ok(payload)
        } else {
            log::warn!("Sentinel API error {status} on {path}");
            Err(ApiError::classify(status, retry_after.as_deref(), payload, &credentials).into())
        }
    }
}

fn build_http(settings: &Settings) -> Result<reqwest::Client, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.clone())
        .default_headers(headers)
        .build()
        .map_err(|err| ClientError::Configuration(format!("failed to build HTTP client: {err}")))
}

/// Parses a response body, honoring the content type.
///
/// A JSON content type is parsed as JSON; anything else, or a body that
/// fails to parse, is wrapped as `{"raw_text": <body>}`. Never fails.
pub(crate) async fn parse_payload(response: Response) -> Value {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"));

    let text = response.text().await.unwrap_or_default();

    if is_json {
        serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw_text": text }))
    } else {
        json!({ "raw_text": text })
    }
}
