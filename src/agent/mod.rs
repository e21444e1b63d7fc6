//! Agent descriptor
//!
//! The assistant itself runs inside an external agent runtime; this module
//! only describes it:
//! - model, name, description and instruction
//! - the MCP toolset it is attached to (launch command, credential names)
//! - an optional filter on which bridge tools are exposed

mod tools;

pub use tools::ToolFilter;

use serde::{Deserialize, Serialize};

use crate::config::{AgentConfig, ConnectionDescriptor};
use crate::{Error, Result};

/// Description of the Salesforce assistant handed to the agent runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Model identifier
    pub model: String,
    /// Agent name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// System instruction
    pub instruction: String,
    /// Toolsets attached to the agent
    pub toolsets: Vec<ToolsetDescriptor>,
}

/// An MCP toolset reachable over a subprocess's stdio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsetDescriptor {
    /// Transport kind
    pub transport: String,
    /// Executable
    pub command: String,
    /// Arguments
    pub args: Vec<String>,
    /// Names of the environment variables forwarded to the subprocess.
    /// Values are never part of the descriptor.
    pub env: Vec<String>,
    /// Which tools the agent may use
    #[serde(default)]
    pub tool_filter: ToolFilter,
}

impl ToolsetDescriptor {
    /// Describe the toolset launched by `connection`
    pub fn stdio(connection: &ConnectionDescriptor, tool_filter: ToolFilter) -> Self {
        Self {
            transport: "stdio".to_string(),
            command: connection.command.clone(),
            args: connection.args.clone(),
            env: connection.env.keys().cloned().collect(),
            tool_filter,
        }
    }
}

impl AgentDescriptor {
    /// Build the descriptor from configuration and the bridge connection
    pub fn from_config(config: &AgentConfig, connection: &ConnectionDescriptor) -> Self {
        let filter = ToolFilter::from(config.tool_filter.clone());

        Self {
            model: config.model.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            instruction: config.instruction.clone(),
            toolsets: vec![ToolsetDescriptor::stdio(connection, filter)],
        }
    }

    /// The stock Salesforce agent attached to `connection`
    pub fn salesforce(connection: &ConnectionDescriptor) -> Self {
        Self::from_config(&AgentConfig::default(), connection)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
