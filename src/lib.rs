//! Context7 Agent - terminal research assistant
//!
//! Answers developer questions with an LLM that retrieves documentation
//! through a Context7 MCP server, and keeps per-conversation transcripts
//! in a single JSON history file.

pub mod agent;
pub mod cli;
pub mod config;
pub mod core;
pub mod history;
pub mod storage;
pub mod utils;

pub use agent::{AgentRuntime, ChatOutcome, McpAgentRuntime, ResearchAgent};
pub use config::Settings;
pub use history::{ChatMessage, ConversationSummary, HistoryManager, Role, Turn};
