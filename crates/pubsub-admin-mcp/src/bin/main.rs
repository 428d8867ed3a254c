//! pubsub-admin-mcp - MCP server for publish/subscribe server administration.
//!
//! # Usage
//!
//! ```bash
//! # Serve over stdio against an in-process loopback server
//! pubsub-admin-mcp stdio
//!
//! # Print the tool catalogue
//! pubsub-admin-mcp tools
//! pubsub-admin-mcp tools --json
//!
//! # Print the effective configuration
//! pubsub-admin-mcp --config ./admin.toml config
//! ```
//!
//! Logs always go to stderr; stdout carries the protocol.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pubsub_admin_mcp::config::{AdminConfig, LogFormat, LoggingConfig, CONFIG_ENV};
use pubsub_admin_mcp::mcp::StdioTransport;
use pubsub_admin_mcp::sdk::loopback::LoopbackServer;
use pubsub_admin_mcp::{build_server, SessionRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "pubsub-admin-mcp")]
#[command(about = "MCP tools for publish/subscribe server administration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdin/stdout with a loopback session bound as the default session
    Stdio,

    /// Print the tool catalogue
    Tools {
        /// Print full definitions, including input schemas, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AdminConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Stdio => serve_stdio(config).await,
        Commands::Tools { json } => print_tools(&config, json).await,
        Commands::Config => {
            println!("{}", config.to_redacted_toml()?);
            Ok(())
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("pubsub_admin_mcp=debug,info")
    } else {
        EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    Ok(())
}

async fn serve_stdio(config: AdminConfig) -> Result<()> {
    let loopback = LoopbackServer::named(config.server.name.clone());
    let session = loopback
        .connect(&config.loopback.principal, &config.loopback.password)
        .with_context(|| {
            format!(
                "Failed to open loopback session for principal '{}'",
                config.loopback.principal
            )
        })?;

    let sessions = Arc::new(SessionRegistry::new());
    sessions.bind(config.session.default_id.clone(), session);

    let server = build_server(&config, sessions).await?;
    info!(
        default_session = server.default_session_id(),
        "Starting MCP server on stdio"
    );
    server.serve(StdioTransport::new()).await?;
    Ok(())
}

async fn print_tools(config: &AdminConfig, json: bool) -> Result<()> {
    let server = build_server(config, Arc::new(SessionRegistry::new())).await?;
    let definitions = server.registry().list().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for definition in &definitions {
        println!(
            "{:<36} {}",
            definition.name,
            definition.description.as_deref().unwrap_or("")
        );
    }
    println!("\n{} tools", definitions.len());
    Ok(())
}
