//! Interactive chat shell
//!
//! Reads lines from stdin, dispatches slash commands, and forwards
//! everything else to the research agent.

use crate::agent::{ChatOutcome, ResearchAgent};
use crate::utils;
use anyhow::Result;
use tokio::io::{self, AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Exit,
    Clear,
    History,
    Conversations,
    Count,
    New,
    Switch(Option<String>),
    Unknown(String),
}

impl SlashCommand {
    /// `None` when `input` is an ordinary message
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default().to_lowercase();
        let argument = parts
            .next()
            .map(str::trim)
            .filter(|arg| !arg.is_empty())
            .map(str::to_string);

        Some(match command.as_str() {
            "help" => SlashCommand::Help,
            "exit" | "quit" => SlashCommand::Exit,
            "clear" => SlashCommand::Clear,
            "history" => SlashCommand::History,
            "conversations" => SlashCommand::Conversations,
            "count" => SlashCommand::Count,
            "new" => SlashCommand::New,
            "switch" => SlashCommand::Switch(argument),
            _ => SlashCommand::Unknown(format!("/{}", command)),
        })
    }
}

pub struct Shell {
    agent: ResearchAgent,
    conversation_id: String,
    running: bool,
}

impl Shell {
    pub fn new(agent: ResearchAgent, conversation_id: impl Into<String>) -> Self {
        Self {
            agent,
            conversation_id: conversation_id.into(),
            running: true,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn agent(&self) -> &ResearchAgent {
        &self.agent
    }

    pub async fn run(&mut self) -> Result<()> {
        self.agent.initialize().await;
        self.show_welcome().await;

        let mut lines = BufReader::new(io::stdin()).lines();

        while self.running {
            utils::print_prompt("You: ");
            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };
            self.handle_line(&line).await;
        }

        utils::print_warning("Goodbye!");
        Ok(())
    }

    async fn show_welcome(&self) {
        utils::print_header("Context7 Research Assistant");
        let count = self.agent.history().message_count(&self.conversation_id).await;
        if count > 0 {
            utils::print_success(&format!(
                "Resumed conversation '{}' with {} previous messages",
                self.conversation_id, count
            ));
        } else {
            utils::print_success(&format!("Conversation '{}' started", self.conversation_id));
        }
        utils::print_info("Type a question, or /help for commands\n");
    }

    /// Handle one line of user input
    pub async fn handle_line(&mut self, line: &str) {
        let input = line.trim();
        if input.is_empty() {
            return;
        }

        match SlashCommand::parse(input) {
            Some(command) => self.handle_command(command).await,
            None => self.process_message(input).await,
        }
    }

    async fn process_message(&self, message: &str) {
        utils::print_info("Assistant is thinking...");

        match self.agent.chat(message, &self.conversation_id).await {
            ChatOutcome::Complete(response) => {
                utils::print_success("Assistant:");
                println!("{}\n", response);
            }
            ChatOutcome::Error(error) => {
                utils::print_error(&format!("Error: {}", error));
                println!();
            }
        }
    }

    async fn handle_command(&mut self, command: SlashCommand) {
        match command {
            SlashCommand::Help => print_help(),
            SlashCommand::Exit => {
                self.running = false;
            }
            SlashCommand::Clear => {
                match self
                    .agent
                    .clear_history(Some(self.conversation_id.as_str()))
                    .await
                {
                    Ok(()) => utils::print_success("Current conversation history cleared."),
                    Err(e) => utils::print_warning(&format!(
                        "Conversation cleared, but history file was not updated: {}",
                        e
                    )),
                }
            }
            SlashCommand::History => {
                let conversations = self.agent.get_conversations().await;
                utils::print_conversations(&conversations);
            }
            SlashCommand::Conversations => {
                let history = self.agent.history();
                let ids = history.conversation_ids().await;
                if ids.is_empty() {
                    utils::print_info("No conversations yet.");
                }
                for id in ids {
                    let count = history.message_count(&id).await;
                    let marker = if id == self.conversation_id { "*" } else { " " };
                    println!("{} {} ({} messages)", marker, id, count);
                }
            }
            SlashCommand::Count => {
                let history = self.agent.history();
                let count = history.message_count(&self.conversation_id).await;
                utils::print_info(&format!(
                    "Messages in '{}': {} (keeping at most {})",
                    self.conversation_id,
                    count,
                    history.max_history()
                ));
            }
            SlashCommand::New => {
                let id = self.fresh_conversation_id().await;
                utils::print_success(&format!("Started new conversation '{}'", id));
                self.conversation_id = id;
            }
            SlashCommand::Switch(Some(id)) => {
                let count = self.agent.history().message_count(&id).await;
                utils::print_success(&format!(
                    "Switched to '{}' ({} messages)",
                    id, count
                ));
                self.conversation_id = id;
            }
            SlashCommand::Switch(None) => {
                utils::print_error("Usage: /switch <conversation-id>");
            }
            SlashCommand::Unknown(name) => {
                utils::print_error(&format!("Unknown command: {}", name));
            }
        }
        println!();
    }

    /// Millisecond timestamp id, suffixed until it names no known conversation
    async fn fresh_conversation_id(&self) -> String {
        let base = format!("conv-{}", chrono::Local::now().format("%Y%m%d-%H%M%S-%3f"));
        let taken = self.agent.history().conversation_ids().await;

        let mut id = base.clone();
        let mut suffix = 1;
        while id == self.conversation_id || taken.contains(&id) {
            suffix += 1;
            id = format!("{}-{}", base, suffix);
        }
        id
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /help           - Show this help");
    println!("  /exit           - Exit the application");
    println!("  /clear          - Clear the current conversation");
    println!("  /history        - Summarize all conversations");
    println!("  /conversations  - List every conversation id with its message count");
    println!("  /count          - Show message count of the current conversation");
    println!("  /new            - Start a new conversation");
    println!("  /switch <id>    - Switch to another conversation");
}
