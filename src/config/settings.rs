use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LlmSettings,
    pub history: HistorySettings,
    pub mcp: McpSettings,
    pub agent: AgentSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    pub history_file: PathBuf,
    pub max_history: usize,
}

/// Command line used to spawn the document-search MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSettings {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: LlmSettings {
                model: "gpt-4o-mini".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                max_tokens: 2048,
                temperature: 0.3,
                max_retries: 3,
                retry_base_delay_ms: 1000,
            },
            history: HistorySettings {
                history_file: PathBuf::from("data/history.json"),
                max_history: 50,
            },
            mcp: McpSettings {
                command: "npx".to_string(),
                args: vec!["-y".to_string(), "@upstash/context7-mcp@latest".to_string()],
            },
            agent: AgentSettings {
                max_iterations: 8,
                timeout_secs: 120,
            },
            logging: LoggingSettings {
                level: "warn".to_string(),
            },
        }
    }
}

impl Settings {
    /// Defaults, then `config/{CONFIG_ENV}`, then `APP__SECTION__KEY` variables
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());
        Self::from_file(&format!("config/{}", config_env))
    }

    /// Like [`Settings::new`] with an explicit (optional) config file
    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(name).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("mcp.args"),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))
    }
}
