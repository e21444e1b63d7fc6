//! Salesforce agent
//!
//! Configures a single LLM-backed assistant that delegates Salesforce data
//! operations to an external MCP tool bridge
//! (`npx -y @tsmztech/mcp-server-salesforce`), plus a contact-fetch helper
//! that issues one fixed SOQL query through that bridge and prints the
//! results.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Environment (.env + SALESFORCE_*)     │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   ConnectionDescriptor / AgentDescriptor│
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   StdioBridge (MCP over child stdio)    │
//! │   tools/call → query capability         │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   fetch_contacts: build → submit →      │
//! │   classify → report                     │
//! └─────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod bridge;
pub mod config;
pub mod contacts;

// Re-exports for convenience
pub use agent::{AgentDescriptor, ToolFilter};
pub use bridge::{Bridge, StdioBridge};
pub use config::{load_connection_descriptor, Config, ConnectionDescriptor};
pub use contacts::{build_query, fetch_contacts, fetch_contacts_to, FetchOutcome, ResultShape};

/// Crate-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
