//! OpenAI-compatible chat-completions client with function calling

use crate::config::LlmSettings;
use crate::history::ChatMessage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("All {0} retry attempts failed")]
    RetriesExhausted(u32),
}

/// Message as exchanged with the completions endpoint.
/// Unlike a stored history turn it can carry tool calls and tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl LlmMessage {
    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain("tool", content)
        }
    }
}

impl From<&ChatMessage> for LlmMessage {
    fn from(message: &ChatMessage) -> Self {
        Self::plain(message.role.as_str(), message.content.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as produced by the model
    #[serde(default)]
    pub arguments: String,
}

/// Function the model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSpec]>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: LlmMessage,
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(api_key: String, settings: LlmSettings) -> Self {
        Self {
            client: Client::new(),
            api_key,
            settings,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// One completion round. The reply either has text content or tool calls.
    pub async fn complete(
        &self,
        messages: &[LlmMessage],
        tools: &[ToolSpec],
    ) -> Result<LlmMessage, LlmError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: (!tools.is_empty()).then_some(tools),
        };

        let max_retries = self.settings.max_retries.max(1);
        let base_delay_ms = self.settings.retry_base_delay_ms;

        let mut last_error = None;

        for attempt in 0..max_retries {
            if attempt > 0 {
                let delay = base_delay_ms * 2_u64.pow(attempt - 1);
                tracing::warn!(
                    "[LlmClient] Retrying API call (attempt {}/{}) after {}ms delay",
                    attempt + 1,
                    max_retries,
                    delay
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            }

            let response = match self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!("[LlmClient] HTTP request failed: {}", e);
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::warn!("[LlmClient] API returned error status {}: {}", status, body);
                last_error = Some(LlmError::Status {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }

            let chat_response = match response.json::<ChatResponse>().await {
                Ok(cr) => cr,
                Err(e) => {
                    tracing::warn!("[LlmClient] Failed to decode response body: {}", e);
                    last_error = Some(LlmError::Decode(e.to_string()));
                    continue;
                }
            };

            return chat_response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message)
                .ok_or_else(|| LlmError::Decode("response contained no choices".to_string()));
        }

        Err(last_error.unwrap_or(LlmError::RetriesExhausted(max_retries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: String) -> LlmSettings {
        LlmSettings {
            model: "test-model".to_string(),
            base_url,
            max_tokens: 256,
            temperature: 0.0,
            max_retries: 2,
            retry_base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Rust is fast."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new("test-key".to_string(), settings(server.uri()));
        let reply = client
            .complete(&[LlmMessage::user("What is Rust?")], &[])
            .await
            .unwrap();

        assert_eq!(reply.content.as_deref(), Some("Rust is fast."));
        assert!(reply.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_complete_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "search", "arguments": "{\"query\":\"tokio\"}"}
                    }]
                }}]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new("k".to_string(), settings(server.uri()));
        let tools = vec![ToolSpec::function("search", "Search docs", json!({"type": "object"}))];
        let reply = client
            .complete(&[LlmMessage::user("tokio docs")], &tools)
            .await
            .unwrap();

        assert_eq!(reply.content, None);
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].function.name, "search");
        assert_eq!(reply.tool_calls[0].function.arguments, "{\"query\":\"tokio\"}");
    }

    #[tokio::test]
    async fn test_error_status_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(2)
            .mount(&server)
            .await;

        let client = LlmClient::new("k".to_string(), settings(server.uri()));
        let err = client
            .complete(&[LlmMessage::user("hi")], &[])
            .await
            .unwrap_err();

        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_history_message_conversion() {
        let message = ChatMessage::new(crate::history::Role::Assistant, "earlier answer");
        let wire = LlmMessage::from(&message);

        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json, json!({"role": "assistant", "content": "earlier answer"}));
    }

    #[test]
    fn test_tool_message_serialization() {
        let json = serde_json::to_value(LlmMessage::tool("call_9", "result")).unwrap();
        assert_eq!(
            json,
            json!({"role": "tool", "content": "result", "tool_call_id": "call_9"})
        );
    }
}
