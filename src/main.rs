use anyhow::Result;
use clap::Parser;
use context7_agent::cli::{Cli, Commands, Shell};
use context7_agent::history::HistoryManager;
use context7_agent::storage::InMemoryStorage;
use context7_agent::{utils, ChatOutcome, McpAgentRuntime, ResearchAgent, Settings};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = match cli.config.as_deref() {
        Some(path) => Settings::from_file(path)?,
        None => Settings::new()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or_default() {
        Commands::Chat {
            conversation,
            ephemeral,
        } => handle_chat(&settings, conversation, ephemeral).await,
        Commands::Ask {
            prompt,
            conversation,
        } => handle_ask(&settings, prompt, conversation).await,
        Commands::History => handle_history(&settings).await,
        Commands::Clear { conversation } => handle_clear(&settings, conversation).await,
    }
}

async fn handle_chat(settings: &Settings, conversation: String, ephemeral: bool) -> Result<()> {
    let api_key = Settings::api_key()?;

    let agent = if ephemeral {
        utils::print_info("Ephemeral mode: conversation will not be saved");
        ResearchAgent::new(
            Arc::new(McpAgentRuntime::new(settings, api_key)),
            HistoryManager::new(
                Arc::new(InMemoryStorage::new()),
                settings.history.max_history,
            ),
            Duration::from_secs(settings.agent.timeout_secs),
        )
    } else {
        ResearchAgent::from_settings(settings, api_key)
    };

    Shell::new(agent, conversation).run().await
}

async fn handle_ask(settings: &Settings, prompt: String, conversation: String) -> Result<()> {
    let agent = ResearchAgent::from_settings(settings, Settings::api_key()?);
    agent.initialize().await;

    match agent.chat(&prompt, &conversation).await {
        ChatOutcome::Complete(response) => {
            println!("{}", response);
            Ok(())
        }
        ChatOutcome::Error(error) => Err(anyhow::anyhow!("Agent error: {}", error)),
    }
}

async fn handle_history(settings: &Settings) -> Result<()> {
    let history = HistoryManager::from_settings(&settings.history);
    history.load().await;

    utils::print_conversations(&history.get_conversations().await);
    Ok(())
}

async fn handle_clear(settings: &Settings, conversation: Option<String>) -> Result<()> {
    let history = HistoryManager::from_settings(&settings.history);
    history.load().await;
    history.clear(conversation.as_deref()).await?;

    match conversation {
        Some(id) => utils::print_success(&format!("Cleared conversation '{}'", id)),
        None => utils::print_success("Cleared all conversations"),
    }
    Ok(())
}
