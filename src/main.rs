//! Salesforce agent CLI
//!
//! Without a subcommand, fetches five contacts through the bridge.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use salesforce_agent::config::{load_env_file, BridgeConfig};
use salesforce_agent::contacts::DEFAULT_LIMIT;
use salesforce_agent::{
    fetch_contacts, AgentDescriptor, Config, ConnectionDescriptor, Result, StdioBridge,
    ToolFilter,
};

/// Limit used when the binary runs without a subcommand
const QUICK_CHECK_LIMIT: u32 = 5;

#[derive(Parser)]
#[command(name = "salesforce-agent")]
#[command(author, version, about = "Salesforce assistant backed by an MCP tool bridge")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Settings file loaded into the environment before credentials are read
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Override the bridge launch command (shell syntax)
    #[arg(long, global = true, env = "SALESFORCE_BRIDGE_COMMAND")]
    bridge_command: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch contacts with an email address
    FetchContacts {
        /// Maximum number of records
        #[arg(long, short, default_value_t = DEFAULT_LIMIT)]
        limit: u32,
    },

    /// List the tools the bridge exposes
    Tools,

    /// Show the agent descriptor
    Agent,

    /// Show the bridge connection (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load config
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(ref line) = cli.bridge_command {
        config.bridge.set_command_line(line)?;
    }

    let env_file = cli
        .env_file
        .clone()
        .unwrap_or_else(|| config.bridge.env_file.clone());
    if let Some(path) = load_env_file(&env_file)? {
        debug!("Environment loaded from {:?}", path);
    }

    let connection = ConnectionDescriptor::from_env(&config.bridge);
    let tool_filter = ToolFilter::from(config.agent.tool_filter.clone());

    match cli.command {
        None => {
            fetch(&connection, &config.bridge, tool_filter, QUICK_CHECK_LIMIT).await?;
        }

        Some(Commands::FetchContacts { limit }) => {
            fetch(&connection, &config.bridge, tool_filter, limit).await?;
        }

        Some(Commands::Tools) => {
            if tool_filter.is_restricted() {
                info!("Tool filter active; hidden tools are not listed");
            }
            let bridge = StdioBridge::connect(&connection, &config.bridge, tool_filter).await?;
            for tool in bridge.list_tools() {
                match tool.description {
                    Some(ref desc) => println!("{}\n    {}", tool.name, first_line(desc)),
                    None => println!("{}", tool.name),
                }
            }
            bridge.shutdown().await?;
        }

        Some(Commands::Agent) => {
            let agent = AgentDescriptor::from_config(&config.agent, &connection);
            println!("{}", agent.to_toml()?);
        }

        Some(Commands::Config) => {
            println!("{}", connection);
            let missing = connection.missing();
            if !missing.is_empty() {
                warn!("Not set: {}", missing.join(", "));
            }
        }
    }

    Ok(())
}

/// Connect, run the contact fetch once and stop the bridge
///
/// A bridge failure is returned unchanged after the bridge is stopped.
async fn fetch(
    connection: &ConnectionDescriptor,
    bridge_config: &BridgeConfig,
    tool_filter: ToolFilter,
    limit: u32,
) -> Result<()> {
    let bridge = StdioBridge::connect(connection, bridge_config, tool_filter).await?;

    let outcome = fetch_contacts(&bridge, limit).await;

    if let Err(e) = bridge.shutdown().await {
        warn!("Failed to stop bridge: {}", e);
    }

    let outcome = outcome?;
    if let Some(count) = outcome.records().map(|r| r.len()) {
        info!("Fetched {} contacts", count);
    } else {
        debug!("Raw bridge result: {}", outcome.into_value());
    }
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}
