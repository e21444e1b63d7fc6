//! Configuration loading and management
//!
//! Two layers:
//! - [`Config`]: optional TOML file with agent and bridge settings
//! - [`ConnectionDescriptor`]: the bridge launch command plus the Salesforce
//!   credentials read from the process environment

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// Environment variables forwarded to the bridge, in launch order
pub const SALESFORCE_ENV_VARS: [&str; 5] = [
    "SALESFORCE_CONNECTION_TYPE",
    "SALESFORCE_USERNAME",
    "SALESFORCE_PASSWORD",
    "SALESFORCE_TOKEN",
    "SALESFORCE_INSTANCE_URL",
];

/// Variables never printed in clear text
const SECRET_ENV_VARS: [&str; 2] = ["SALESFORCE_PASSWORD", "SALESFORCE_TOKEN"];

/// Command used to launch the bridge
pub const DEFAULT_BRIDGE_COMMAND: &str = "npx";

/// npm package providing the Salesforce MCP server
pub const DEFAULT_BRIDGE_PACKAGE: &str = "@tsmztech/mcp-server-salesforce";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent descriptor overrides
    #[serde(default)]
    pub agent: AgentConfig,

    /// Bridge launch and query settings
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Config {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(expand_path).or_else(|| {
            // Try .salesforce-agent/config.toml in current directory
            let local = PathBuf::from(".salesforce-agent/config.toml");
            if local.exists() {
                return Some(local);
            }

            // Try ~/.salesforce-agent/config.toml
            dirs::home_dir().map(|h| h.join(".salesforce-agent/config.toml"))
        });

        match config_path {
            Some(p) if p.exists() => {
                debug!("Loading config from {:?}", p);
                let content = std::fs::read_to_string(&p)?;
                let config: Config = toml::from_str(&content)?;
                Ok(config)
            }
            Some(p) if path.is_some() => Err(Error::Config(format!(
                "Config file not found: {}",
                p.display()
            ))),
            _ => Ok(Config::default()),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model the agent runtime should use
    #[serde(default = "default_model")]
    pub model: String,

    /// Agent name
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Short description shown to the runtime
    #[serde(default = "default_description")]
    pub description: String,

    /// System instruction
    #[serde(default = "default_instruction")]
    pub instruction: String,

    /// Restrict the toolset to these tool names (None = expose everything)
    #[serde(default)]
    pub tool_filter: Option<Vec<String>>,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_agent_name() -> String {
    "salesforce_agent".to_string()
}

fn default_description() -> String {
    "Agent specialized in Salesforce data and operations.".to_string()
}

fn default_instruction() -> String {
    "Assist users with Salesforce queries, CRUD operations, and reporting tasks.".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            name: default_agent_name(),
            description: default_description(),
            instruction: default_instruction(),
            tool_filter: None,
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Executable that starts the bridge
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// MCP tool invoked by the query capability. The default `query` is
    /// the capability name the agent runtime used; bridges that expose SOQL
    /// under another tool need this set, e.g.
    /// `query_tool = "salesforce_query_records"` in the
    /// `[bridge]` table of the config file.
    #[serde(default = "default_query_tool")]
    pub query_tool: String,

    /// Argument key carrying the SOQL text
    #[serde(default = "default_query_argument")]
    pub query_argument: String,

    /// Settings file loaded into the environment before credentials are read
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

fn default_command() -> String {
    DEFAULT_BRIDGE_COMMAND.to_string()
}

fn default_args() -> Vec<String> {
    vec!["-y".to_string(), DEFAULT_BRIDGE_PACKAGE.to_string()]
}

fn default_query_tool() -> String {
    "query".to_string()
}

fn default_query_argument() -> String {
    "query".to_string()
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            query_tool: default_query_tool(),
            query_argument: default_query_argument(),
            env_file: default_env_file(),
        }
    }
}

impl BridgeConfig {
    /// Replace command and arguments from a single shell-style command line
    pub fn set_command_line(&mut self, line: &str) -> Result<()> {
        let mut words = shell_words::split(line)
            .map_err(|e| Error::Config(format!("Invalid bridge command '{}': {}", line, e)))?;

        if words.is_empty() {
            return Err(Error::Config("Bridge command is empty".to_string()));
        }

        self.command = words.remove(0);
        self.args = words;
        Ok(())
    }
}

/// Launch parameters for the bridge subprocess
///
/// Built once at startup and never mutated. Missing environment variables
/// are kept as `None` entries; they surface later as bridge failures, not
/// as load errors.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    /// Executable
    pub command: String,
    /// Arguments
    pub args: Vec<String>,
    /// Environment overlay, one entry per variable in [`SALESFORCE_ENV_VARS`]
    pub env: BTreeMap<String, Option<String>>,
}

impl ConnectionDescriptor {
    /// Build a descriptor using `lookup` to resolve each credential variable
    pub fn from_lookup<F>(bridge: &BridgeConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = SALESFORCE_ENV_VARS
            .iter()
            .map(|key| (key.to_string(), lookup(key)))
            .collect();

        Self {
            command: bridge.command.clone(),
            args: bridge.args.clone(),
            env,
        }
    }

    /// Build a descriptor from the current process environment
    pub fn from_env(bridge: &BridgeConfig) -> Self {
        Self::from_lookup(bridge, |key| std::env::var(key).ok())
    }

    /// Value of a credential variable, if set
    pub fn get(&self, key: &str) -> Option<&str> {
        self.env.get(key).and_then(|v| v.as_deref())
    }

    /// Variables that will actually be set on the child process
    pub fn env_overlay(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    /// Names of variables that were not found
    pub fn missing(&self) -> Vec<&str> {
        self.env
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Command line as it would be typed in a shell
    pub fn command_line(&self) -> String {
        let mut words = vec![self.command.as_str()];
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }

    fn display_value(key: &str, value: Option<&str>) -> String {
        match value {
            None => "<unset>".to_string(),
            Some(_) if SECRET_ENV_VARS.contains(&key) => "********".to_string(),
            Some(v) => v.to_string(),
        }
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "command: {}", self.command_line())?;
        write!(f, "env:")?;
        for key in SALESFORCE_ENV_VARS {
            write!(
                f,
                "\n  {}={}",
                key,
                Self::display_value(key, self.get(key))
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env: BTreeMap<&str, String> = self
            .env
            .iter()
            .map(|(k, v)| (k.as_str(), Self::display_value(k, v.as_deref())))
            .collect();

        f.debug_struct("ConnectionDescriptor")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &env)
            .finish()
    }
}

/// Read the Salesforce credentials from the environment with the default
/// bridge launch command. Never fails.
pub fn load_connection_descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::from_env(&BridgeConfig::default())
}

/// Load a dotenv-style settings file into the process environment
///
/// Variables already present in the environment are kept. A missing file is
/// not an error; returns the path that was loaded, if any.
pub fn load_env_file(path: &Path) -> Result<Option<PathBuf>> {
    let path = expand_path(path);

    match dotenvy::from_path(&path) {
        Ok(()) => {
            debug!("Loaded environment from {:?}", path);
            Ok(Some(path))
        }
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No env file at {:?}", path);
            Ok(None)
        }
        Err(e) => Err(Error::Config(format!(
            "Failed to load {}: {}",
            path.display(),
            e
        ))),
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}
