mod settings;

pub use settings::{
    AgentSettings, HistorySettings, LlmSettings, LoggingSettings, McpSettings, Settings,
};
