//! MCP tool surface for the Sentinel Signal scoring API.
//!
//! Four tools, each a thin wrapper over a [`SentinelClient`] operation.
//! Successful payloads pass through unchanged when they are JSON objects
//! and are wrapped as `{"result": ...}` otherwise, so tool output is
//! always an object. Failures become an error result carrying the
//! structured `{"error": {...}}` envelope instead of a protocol error,
//! which lets the calling model read the remediation hints.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, schemars, tool, tool_handler, tool_router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use sentinel_client::{ClientError, SentinelClient};

/// Arguments for the `score_workflow` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScoreWorkflowArgs {
    /// Workflow identifier to score against.
    pub workflow: String,
    /// Workflow input payload, passed through to the scoring API.
    pub payload: Value,
    /// Optional scoring options (thresholds, explanations).
    #[serde(default)]
    pub options: Option<Value>,
}

/// Arguments for the `get_usage` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetUsageArgs {
    /// Month to report on, as `YYYY-MM`. Defaults to the current month.
    #[serde(default)]
    pub month: Option<String>,
}

/// Arguments for the `submit_feedback` tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SubmitFeedbackArgs {
    /// Feedback payload referencing a prior scoring request.
    pub feedback: Value,
}

/// MCP server exposing Sentinel Signal scoring tools over stdio.
#[derive(Clone)]
pub struct SentinelServer {
    client: Arc<SentinelClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SentinelServer {
    /// Creates a server wrapping the given API client.
    pub fn new(client: Arc<SentinelClient>) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    /// Score a workflow payload with Sentinel Signal.
    #[tool(
        description = "Score a workflow payload with Sentinel Signal. Returns the score, decision, and any explanations."
    )]
    pub async fn score_workflow(
        &self,
        Parameters(args): Parameters<ScoreWorkflowArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!(workflow = %args.workflow, "score_workflow tool call");
        reply(
            self.client
                .score_workflow(&args.workflow, args.payload, args.options)
                .await,
        )
    }

    /// Fetch the rate and quota limits for the active credential.
    #[tool(
        description = "Fetch rate and quota limits for the active Sentinel Signal credential."
    )]
    pub async fn get_limits(&self) -> Result<CallToolResult, McpError> {
        debug!("get_limits tool call");
        reply(self.client.get_limits().await)
    }

    /// Fetch usage statistics for the active credential.
    #[tool(
        description = "Fetch usage statistics for the active Sentinel Signal credential, optionally for a specific YYYY-MM month."
    )]
    pub async fn get_usage(
        &self,
        Parameters(args): Parameters<GetUsageArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!(month = ?args.month, "get_usage tool call");
        reply(self.client.get_usage(args.month.as_deref()).await)
    }

    /// Submit feedback on a prior scoring decision.
    #[tool(
        description = "Submit feedback on a prior Sentinel Signal scoring decision to improve future scores."
    )]
    pub async fn submit_feedback(
        &self,
        Parameters(args): Parameters<SubmitFeedbackArgs>,
    ) -> Result<CallToolResult, McpError> {
        debug!("submit_feedback tool call");
        reply(self.client.submit_feedback(args.feedback).await)
    }
}

#[tool_handler]
impl ServerHandler for SentinelServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Sentinel Signal workflow scoring. Use score_workflow to score a payload, \
                 get_limits and get_usage to inspect the active plan, and submit_feedback \
                 to report on prior decisions. Credentials resolve automatically: set \
                 SENTINEL_API_KEY for a paid plan, or let the server mint a trial key."
                    .to_string(),
            ),
            ..ServerInfo::default()
        }
    }
}

/// Converts a client result into a tool result.
fn reply(result: Result<Value, ClientError>) -> Result<CallToolResult, McpError> {
    match result {
        Ok(value) => {
            let wrapped = if value.is_object() {
                value
            } else {
                json!({ "result": value })
            };
            Ok(CallToolResult::success(vec![Content::json(wrapped)?]))
        }
        Err(err) => Ok(CallToolResult::error(vec![Content::json(error_envelope(
            &err,
        ))?])),
    }
}

/// Shapes a client error into the `{"error": {...}}` envelope tools emit.
fn error_envelope(err: &ClientError) -> Value {
    match err {
        ClientError::Api(api) => {
            let mut error = serde_json::Map::new();
            error.insert("message".to_string(), json!(api.message));
            if let Some(status) = api.status {
                error.insert("status".to_string(), json!(status));
            }
            if let Some(code) = &api.code {
                error.insert("code".to_string(), json!(code));
            }
            if let Some(action) = api.action {
                error.insert("action".to_string(), json!(action.to_string()));
            }
            if let Some(seconds) = api.retry_after {
                error.insert("retry_after_seconds".to_string(), json!(seconds));
            }
            if let Some(url) = &api.upgrade_url {
                error.insert("upgrade_url".to_string(), json!(url));
            }
            json!({ "error": error })
        }
        ClientError::Credential(credential) => json!({
            "error": {
                "message": credential.to_string(),
                "code": "credential_resolution_failed",
                "action": "configure_credentials",
            }
        }),
        ClientError::Configuration(message) => json!({
            "error": {
                "message": message,
                "code": "configuration_error",
            }
        }),
        // `ClientError` is `#[non_exhaustive]`; unreachable today.
        other => json!({
            "error": {
                "message": other.to_string(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use sentinel_client::{ApiError, CredentialError, ErrorAction};

    use super::*;

    fn success_payload(result: Result<Value, ClientError>) -> Value {
        let call = reply(result).unwrap();
        assert_ne!(call.is_error, Some(true));
        content_json(&call)
    }

    fn error_payload(result: Result<Value, ClientError>) -> Value {
        let call = reply(result).unwrap();
        assert_eq!(call.is_error, Some(true));
        content_json(&call)
    }

    fn content_json(call: &CallToolResult) -> Value {
        let text = call.content[0].as_text().unwrap().text.clone();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_object_payload_passes_through() {
        let payload = success_payload(Ok(json!({"score": 0.9, "decision": "approve"})));
        assert_eq!(payload["decision"], "approve");
    }

    #[test]
    fn test_scalar_payload_is_wrapped() {
        let payload = success_payload(Ok(json!(42)));
        assert_eq!(payload, json!({"result": 42}));

        let payload = success_payload(Ok(json!(["a", "b"])));
        assert_eq!(payload, json!({"result": ["a", "b"]}));
    }

    #[test]
    fn test_api_error_envelope_carries_taxonomy_fields() {
        let api = ApiError {
            message: "Trial monthly quota exhausted.".to_string(),
            status: Some(402),
            code: Some("quota_exhausted".to_string()),
            action: Some(ErrorAction::UpgradeRequired),
            retry_after: None,
            upgrade_url: Some("https://sentinelsignal.io/portal/dashboard".to_string()),
            payload: None,
        };

        let payload = error_payload(Err(ClientError::Api(api)));
        let error = &payload["error"];
        assert_eq!(error["status"], 402);
        assert_eq!(error["code"], "quota_exhausted");
        assert_eq!(error["action"], "upgrade_required");
        assert_eq!(
            error["upgrade_url"],
            "https://sentinelsignal.io/portal/dashboard"
        );
        assert!(error.get("retry_after_seconds").is_none());
    }

    #[test]
    fn test_rate_limit_envelope_includes_retry_after() {
        let api = ApiError {
            message: "slow down".to_string(),
            status: Some(429),
            code: Some("rate_limited".to_string()),
            action: Some(ErrorAction::RetryLater),
            retry_after: Some(2),
            upgrade_url: None,
            payload: None,
        };

        let payload = error_payload(Err(ClientError::Api(api)));
        assert_eq!(payload["error"]["retry_after_seconds"], 2);
        assert_eq!(payload["error"]["action"], "retry_later");
    }

    #[test]
    fn test_credential_error_envelope() {
        let payload = error_payload(Err(ClientError::Credential(
            CredentialError::TrialDisabled,
        )));
        let error = &payload["error"];
        assert_eq!(error["code"], "credential_resolution_failed");
        assert_eq!(error["action"], "configure_credentials");
        assert!(
            error["message"]
                .as_str()
                .unwrap()
                .contains("SENTINEL_API_KEY")
        );
    }

    #[test]
    fn test_transport_error_envelope_has_no_status() {
        let api = ApiError {
            message: "HTTP request to Sentinel API failed: connection refused".to_string(),
            status: None,
            code: None,
            action: None,
            retry_after: None,
            upgrade_url: None,
            payload: None,
        };

        let payload = error_payload(Err(ClientError::Api(api)));
        assert!(payload["error"].get("status").is_none());
        assert!(
            payload["error"]["message"]
                .as_str()
                .unwrap()
                .contains("connection refused")
        );
    }
}
