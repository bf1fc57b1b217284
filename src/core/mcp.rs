//! MCP (Model Context Protocol) client over a child process's stdio
//!
//! Requests are line-delimited JSON-RPC 2.0. Anything on stdout that is not
//! the response to the pending request (log lines, notifications) is skipped.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn MCP server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("MCP server closed its output stream")]
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", alias = "input_schema", default = "default_input_schema")]
    pub input_schema: Value,
}

fn default_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

/// Flattened result of a `tools/call`
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

pub struct McpClient {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    request_id: u64,
}

impl McpClient {
    /// Spawn the server and complete the `initialize` handshake
    pub async fn new(command: &str, args: &[String]) -> Result<Self, McpError> {
        let mut process = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("Failed to get stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("Failed to get stdout".to_string()))?;

        let mut client = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            request_id: 0,
        };

        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<(), McpError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;

        let name = server_name(&result);
        tracing::debug!("[McpClient] Initialized with server {}", name);

        self.send(&json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .await
    }

    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>, McpError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));

        serde_json::from_value(tools)
            .map_err(|e| McpError::Protocol(format!("Invalid tools/list result: {}", e)))
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolOutput, McpError> {
        let result = self
            .request(
                "tools/call",
                json!({
                    "name": name,
                    "arguments": arguments
                }),
            )
            .await?;

        let call: CallToolResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Invalid tools/call result: {}", e)))?;

        let text = call
            .content
            .iter()
            .map(|part| match part.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolOutput {
            text,
            is_error: call.is_error,
        })
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id();
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        }))
        .await?;

        let response = self.read_response(id).await?;
        match (response.result, response.error) {
            (_, Some(error)) => Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(McpError::Protocol(format!(
                "Response to '{}' had neither result nor error",
                method
            ))),
        }
    }

    async fn send(&mut self, message: &Value) -> Result<(), McpError> {
        let json = serde_json::to_string(message)
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        self.stdin.write_all(json.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<RpcResponse, McpError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(McpError::Closed);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(_) => {
                    tracing::debug!("[McpClient] Skipping non-JSON output: {}", trimmed);
                    continue;
                }
            };

            if message.get("id").and_then(Value::as_u64) != Some(id) {
                tracing::trace!("[McpClient] Skipping unrelated message: {}", trimmed);
                continue;
            }

            return serde_json::from_value(message)
                .map_err(|e| McpError::Protocol(format!("Malformed response: {}", e)));
        }
    }

    fn next_id(&mut self) -> u64 {
        self.request_id += 1;
        self.request_id
    }
}

fn server_name(initialize_result: &Value) -> &str {
    initialize_result
        .get("serverInfo")
        .and_then(|info| info.get("name"))
        .and_then(|name| name.as_str())
        .unwrap_or("<unnamed>")
}

impl Drop for McpClient {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}
