//! Clients for the external services the agent runtime talks to

pub mod llm;
pub mod mcp;
