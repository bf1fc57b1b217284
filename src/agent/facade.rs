//! Research Agent facade
//!
//! Information Hiding:
//! - Runtime invocation, timeout, and history bookkeeping hidden behind `chat`
//! - A failed exchange leaves the conversation exactly as it was

use super::{AgentRuntime, ChatOutcome, McpAgentRuntime};
use crate::config::Settings;
use crate::history::{ChatMessage, ConversationSummary, HistoryManager, Role};
use crate::storage::StorageError;
use std::sync::Arc;
use std::time::Duration;

pub struct ResearchAgent {
    runtime: Arc<dyn AgentRuntime>,
    history: HistoryManager,
    timeout: Duration,
}

impl ResearchAgent {
    pub fn new(runtime: Arc<dyn AgentRuntime>, history: HistoryManager, timeout: Duration) -> Self {
        Self {
            runtime,
            history,
            timeout,
        }
    }

    /// MCP-backed agent with history persisted to the configured file
    pub fn from_settings(settings: &Settings, api_key: String) -> Self {
        Self::new(
            Arc::new(McpAgentRuntime::new(settings, api_key)),
            HistoryManager::from_settings(&settings.history),
            Duration::from_secs(settings.agent.timeout_secs),
        )
    }

    pub async fn initialize(&self) {
        self.history.load().await;
        tracing::info!("[ResearchAgent] Initialized");
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Send `message` in `conversation_id`. Both sides of the exchange are
    /// recorded only when the runtime produces an answer.
    pub async fn chat(&self, message: &str, conversation_id: &str) -> ChatOutcome {
        let message_history = self.history.get_messages(conversation_id).await;

        let result = tokio::time::timeout(
            self.timeout,
            self.runtime.run(message, &message_history),
        )
        .await;

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!("[ResearchAgent] Agent pipeline error: {:#}", e);
                return ChatOutcome::Error(format!("{:#}", e));
            }
            Err(_) => {
                tracing::error!(
                    "[ResearchAgent] Agent timed out after {:?}",
                    self.timeout
                );
                return ChatOutcome::Error(format!(
                    "Agent timed out after {}s",
                    self.timeout.as_secs_f64()
                ));
            }
        };

        self.history
            .add_message(conversation_id, Role::User, message)
            .await;
        self.history
            .add_message(conversation_id, Role::Assistant, response.as_str())
            .await;

        ChatOutcome::Complete(response)
    }

    pub async fn get_messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.history.get_messages(conversation_id).await
    }

    pub async fn get_conversations(&self) -> Vec<ConversationSummary> {
        self.history.get_conversations().await
    }

    /// The conversations are gone from memory even when the write fails
    pub async fn clear_history(&self, conversation_id: Option<&str>) -> Result<(), StorageError> {
        self.history.clear(conversation_id).await
    }
}
