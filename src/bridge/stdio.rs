//! MCP bridge over a child process's stdio
//!
//! Launches the bridge from a [`ConnectionDescriptor`], performs the MCP
//! handshake and exchanges newline-delimited JSON-RPC messages. Requests are
//! serialized through a single lock around the pipes.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::jsonrpc::{
    JsonRpcMessage, JsonRpcRequest, ToolCallResult, ToolDefinition, ToolsListResult,
    PROTOCOL_VERSION,
};
use super::Bridge;
use crate::agent::ToolFilter;
use crate::config::{BridgeConfig, ConnectionDescriptor};
use crate::{Error, Result};

/// Operations this bridge offers, listed when a query fails
const CAPABILITIES: [&str; 5] = ["call_tool", "list_tools", "name", "query", "shutdown"];

/// Bridge talking MCP to a subprocess
pub struct StdioBridge {
    /// Command line, for logs
    command_line: String,
    /// Tool behind the query capability
    query_tool: String,
    /// Argument key for the SOQL text
    query_argument: String,
    /// Which tools are exposed to callers
    filter: ToolFilter,
    /// Tools reported by the server during the handshake
    tools: Vec<ToolDefinition>,
    /// Pipes to the child
    io: Mutex<BridgeIo>,
}

/// Live pipes and request counter
struct BridgeIo {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl BridgeIo {
    async fn send(&mut self, message: &JsonRpcRequest<'_>) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        debug!("-> {}", line);
        line.push('\n');

        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&JsonRpcRequest::new(id, method, params)).await?;

        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => {
                    let status = self.child.try_wait()?;
                    return Err(Error::Bridge(match status {
                        Some(status) => format!("bridge exited with {} during {}", status, method),
                        None => format!("bridge closed stdout during {}", method),
                    }));
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            debug!("<- {}", line);

            let message: JsonRpcMessage = match serde_json::from_str(line) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping non JSON-RPC output: {} - {}", e, line);
                    continue;
                }
            };

            if message.is_response_to(id) {
                return message.into_result();
            }

            if let Some(ref method) = message.method {
                debug!("Ignoring server message {}", method);
            }
        }
    }

    async fn notify(&mut self, method: &str) -> Result<()> {
        self.send(&JsonRpcRequest::notification(method, Value::Null))
            .await
    }
}

/// Warning shown when the handshake does not list the configured query tool
fn missing_query_tool_hint(query_tool: &str) -> String {
    format!(
        "Bridge does not list query tool '{}'; queries will likely fail. \
         Set bridge.query_tool in the config file to the bridge's SOQL tool",
        query_tool
    )
}

impl StdioBridge {
    /// Launch the bridge and complete the MCP handshake
    pub async fn connect(
        connection: &ConnectionDescriptor,
        config: &BridgeConfig,
        filter: ToolFilter,
    ) -> Result<Self> {
        let command_line = connection.command_line();

        let missing = connection.missing();
        if !missing.is_empty() {
            debug!("Launching bridge without {}", missing.join(", "));
        }

        info!("Starting bridge: {}", command_line);

        let mut child = Command::new(&connection.command)
            .args(&connection.args)
            .envs(connection.env_overlay())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Bridge(format!("Failed to spawn {}: {}", command_line, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Bridge("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Bridge("Failed to capture stdout".to_string()))?;

        let mut io = BridgeIo {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            next_id: 1,
        };

        let init = io
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;

        if let Some(server) = init.get("serverInfo").and_then(|s| s.get("name")) {
            info!("Connected to bridge server {}", server);
        }

        io.notify("notifications/initialized").await?;

        let listed: ToolsListResult = serde_json::from_value(io.request("tools/list", json!({})).await?)?;
        debug!("Bridge offers {} tools", listed.tools.len());

        if !listed.tools.iter().any(|t| t.name == config.query_tool) {
            warn!("{}", missing_query_tool_hint(&config.query_tool));
        }

        Ok(Self {
            command_line,
            query_tool: config.query_tool.clone(),
            query_argument: config.query_argument.clone(),
            filter,
            tools: listed.tools,
            io: Mutex::new(io),
        })
    }

    /// Tools the server listed, narrowed by the tool filter
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.filter.apply(self.tools.clone(), |t| t.name.as_str())
    }

    /// Call a tool and collapse its result into one JSON value
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        if !self.filter.allows(name) {
            return Err(Error::Bridge(format!("Tool '{}' is filtered out", name)));
        }

        let mut io = self.io.lock().await;
        let raw = io
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        drop(io);

        let result: ToolCallResult = serde_json::from_value(raw)?;
        result.into_value()
    }

    /// Stop the bridge process
    pub async fn shutdown(&self) -> Result<()> {
        info!("Stopping bridge: {}", self.command_line);

        let mut io = self.io.lock().await;
        if io.child.try_wait()?.is_none() {
            io.child.kill().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Bridge for StdioBridge {
    fn name(&self) -> &str {
        &self.command_line
    }

    async fn query(&self, soql: &str) -> Result<Value> {
        let mut arguments = serde_json::Map::new();
        arguments.insert(self.query_argument.clone(), Value::String(soql.to_string()));
        self.call_tool(&self.query_tool, Value::Object(arguments))
            .await
    }

    fn capability_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = CAPABILITIES.iter().map(|s| s.to_string()).collect();
        names.extend(self.list_tools().into_iter().map(|t| t.name));
        Ok(names)
    }
}
