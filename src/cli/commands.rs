use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "context7")]
#[command(author, version, about = "Research assistant grounded in Context7 documentation", long_about = None)]
pub struct Cli {
    /// Config file to load instead of config/{CONFIG_ENV}
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Start an interactive chat session (default)
    Chat {
        /// Conversation to resume or start
        #[arg(short = 'c', long, default_value = "default")]
        conversation: String,

        /// Keep history in memory only for this session
        #[arg(long)]
        ephemeral: bool,
    },

    /// Ask a single question and print the answer
    Ask {
        prompt: String,

        #[arg(short = 'c', long, default_value = "default")]
        conversation: String,
    },

    /// List stored conversations, most recent first
    History,

    /// Delete stored history
    Clear {
        /// Only clear this conversation (default: all conversations)
        #[arg(short = 'c', long)]
        conversation: Option<String>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Chat {
            conversation: "default".to_string(),
            ephemeral: false,
        }
    }
}
