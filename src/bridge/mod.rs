//! Bridge abstraction for the external Salesforce tool server
//!
//! The bridge owns query execution; this crate only needs its query
//! capability and, for diagnostics, the names of what it exposes.
//!
//! Supports:
//! - MCP over a child process's stdio ([`StdioBridge`])

pub mod jsonrpc;
mod stdio;

pub use jsonrpc::ToolDefinition;
pub use stdio::StdioBridge;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Core bridge trait
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Name of this bridge, for logs
    fn name(&self) -> &str;

    /// Run a SOQL query and return whatever the bridge produced
    ///
    /// The shape of the returned value is not controlled here.
    async fn query(&self, soql: &str) -> Result<Value>;

    /// Names of the capabilities this bridge exposes, for debugging output
    fn capability_names(&self) -> Result<Vec<String>>;
}
