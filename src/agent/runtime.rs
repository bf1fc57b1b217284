//! Agent runtime backed by an LLM with tools discovered from an MCP server
//!
//! Each `run` spawns the configured MCP server, exposes its tools to the
//! model as functions, and loops until the model answers without tool calls.

use super::AgentRuntime;
use crate::config::{McpSettings, Settings};
use crate::core::llm::{LlmClient, LlmMessage, ToolCall, ToolSpec};
use crate::core::mcp::{McpClient, McpError, McpTool};
use crate::history::ChatMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub const AGENT_SYSTEM_PROMPT: &str = "\
You are a world-class AI research assistant for software developers named Context7.

## CORE DIRECTIVE
Your SOLE PURPOSE is to provide answers by exclusively using information retrieved from the attached documentation tools. You are FORBIDDEN from using your own internal, pre-trained knowledge.

## RULES OF ENGAGEMENT
1.  **TOOL-FIRST MENTALITY:** For any user question that is not a simple greeting, you MUST ALWAYS call a documentation tool with a concise query to gather context before formulating an answer.
2.  **GROUNDED SYNTHESIS:** You MUST synthesize your final answer using ONLY the documents and content provided in the tool output.
3.  **FAILURE PROTOCOL:** If the tools return no relevant documents, you MUST respond with the exact phrase: \"I could not find any relevant information in the Context7 knowledge base to answer your question.\"

## RESPONSE FORMAT
Format your responses in clear, readable markdown. Use code blocks for code examples.
";

pub struct McpAgentRuntime {
    llm: LlmClient,
    mcp: McpSettings,
    max_iterations: usize,
}

impl McpAgentRuntime {
    pub fn new(settings: &Settings, api_key: String) -> Self {
        Self {
            llm: LlmClient::new(api_key, settings.llm.clone()),
            mcp: settings.mcp.clone(),
            max_iterations: settings.agent.max_iterations,
        }
    }
}

#[async_trait]
impl AgentRuntime for McpAgentRuntime {
    async fn run(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        let mut mcp = McpClient::new(&self.mcp.command, &self.mcp.args)
            .await
            .with_context(|| {
                format!(
                    "Failed to start MCP server: {} {}",
                    self.mcp.command,
                    self.mcp.args.join(" ")
                )
            })?;

        let tools = mcp
            .list_tools()
            .await
            .context("Failed to list MCP tools")?;
        tracing::info!("[McpAgentRuntime] Found {} tools from MCP server", tools.len());
        let specs: Vec<ToolSpec> = tools.iter().map(tool_spec).collect();

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(LlmMessage::system(AGENT_SYSTEM_PROMPT));
        messages.extend(history.iter().map(LlmMessage::from));
        messages.push(LlmMessage::user(message));

        for iteration in 0..self.max_iterations {
            let reply = self.llm.complete(&messages, &specs).await?;

            if reply.tool_calls.is_empty() {
                tracing::debug!(
                    "[McpAgentRuntime] Final answer after {} iterations",
                    iteration + 1
                );
                return Ok(reply.content.unwrap_or_default());
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in calls {
                let output = execute_tool_call(&mut mcp, &call).await?;
                messages.push(LlmMessage::tool(call.id, output));
            }
        }

        anyhow::bail!(
            "Agent did not produce an answer within {} iterations",
            self.max_iterations
        )
    }
}

fn tool_spec(tool: &McpTool) -> ToolSpec {
    ToolSpec::function(
        tool.name.clone(),
        tool.description.clone().unwrap_or_default(),
        tool.input_schema.clone(),
    )
}

/// Run one tool call. Failures the model can react to come back as text;
/// only a broken connection to the server is an error.
async fn execute_tool_call(mcp: &mut McpClient, call: &ToolCall) -> Result<String, McpError> {
    tracing::info!("[McpAgentRuntime] Calling tool '{}'", call.function.name);

    let arguments: Value = if call.function.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(e) => return Ok(format!("Error: invalid tool arguments: {}", e)),
        }
    };

    match mcp.call_tool(&call.function.name, arguments).await {
        Ok(output) if output.is_error => Ok(format!("Error: {}", output.text)),
        Ok(output) => Ok(output.text),
        Err(McpError::Rpc { code, message }) => {
            tracing::warn!(
                "[McpAgentRuntime] Tool '{}' failed ({}): {}",
                call.function.name,
                code,
                message
            );
            Ok(format!("Error: {}", message))
        }
        Err(e) => Err(e),
    }
}
