//! Conversation agent
//!
//! Information Hiding:
//! - The model, its tools, and the MCP server sit behind `AgentRuntime`
//! - `ResearchAgent` is the only surface the shell talks to
//! - History is mutated only after a successful runtime call

pub mod facade;
pub mod runtime;

pub use facade::ResearchAgent;
pub use runtime::{McpAgentRuntime, AGENT_SYSTEM_PROMPT};

use crate::history::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Anything that can turn a message plus prior turns into an answer
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run(&self, message: &str, history: &[ChatMessage]) -> Result<String>;
}

/// Tagged result of one chat exchange.
/// Serializes as `{"type": "complete" | "error", "data": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChatOutcome {
    Complete(String),
    Error(String),
}

impl ChatOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ChatOutcome::Complete(_))
    }

    pub fn data(&self) -> &str {
        match self {
            ChatOutcome::Complete(data) | ChatOutcome::Error(data) => data,
        }
    }
}
