//! Gmail MCP Server
//!
//! `gmail-autoauth-mcp auth` runs the browser OAuth flow and exits; with no
//! subcommand the MCP server speaks JSON-RPC on stdio.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use gmail_autoauth_mcp::auth::{AuthFlow, CredentialStore, FlowOptions, OAuthKeys, Session};
use gmail_autoauth_mcp::config::{Config, OAUTH_KEYS_FILE};
use gmail_autoauth_mcp::gmail::GmailClient;
use gmail_autoauth_mcp::mcp::server::McpServer;

/// Gmail MCP Server
#[derive(Parser)]
#[command(name = "gmail-autoauth-mcp")]
#[command(author, version, about = "Gmail MCP Server - A Model Context Protocol server for Gmail")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Gmail (run this first)
    Auth {
        /// Custom OAuth redirect URL
        callback_url: Option<String>,

        /// Discard stored credentials before authenticating
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::new().context("Failed to load configuration")?;
    config.ensure_config_dir()?;

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    config.adopt_local_oauth_keys(&cwd)?;

    let keys = OAuthKeys::load(&config.oauth_path).with_context(|| {
        format!(
            "Please place {} in the current directory or {}",
            OAUTH_KEYS_FILE,
            config.config_dir.display()
        )
    })?;

    match cli.command {
        Some(Commands::Auth {
            callback_url,
            force,
        }) => authenticate(config, keys, callback_url, force).await,
        None => run_server(config, keys).await,
    }
}

async fn authenticate(
    config: Config,
    keys: OAuthKeys,
    callback_url: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let config = match callback_url {
        Some(url) => config.with_callback_url(url),
        None => config,
    };

    let store = CredentialStore::new(config.credentials_path.clone());
    if force {
        store.remove().await?;
        tracing::info!(path = %config.credentials_path.display(), "Removed stored credentials");
    }

    let session = Session::new(keys, store, config.oauth_callback_url.clone());
    let mut flow = AuthFlow::new(&session, FlowOptions::new(config.oauth_callback_port));
    flow.run().await.context("Authentication failed")?;

    eprintln!("Authentication completed successfully!");
    Ok(())
}

async fn run_server(config: Config, keys: OAuthKeys) -> anyhow::Result<()> {
    let store = CredentialStore::new(config.credentials_path.clone());
    let session = Session::load(keys, store, config.oauth_callback_url.clone())
        .await
        .context("Failed to read stored credentials")?;

    if !session.validate().await {
        bail!("Not authenticated. Please run 'gmail-autoauth-mcp auth' first.");
    }

    let gmail_client = Arc::new(GmailClient::new(Arc::new(session)));
    let mut server = McpServer::new(gmail_client);

    tracing::info!("Gmail MCP server running on stdio");
    server.run_stdio().await?;
    Ok(())
}
