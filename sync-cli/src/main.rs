//! # sync-cli
//!
//! Command-line front end for spacesync.
//!
//! ## Commands
//!
//! - `init`: Write a client configuration file
//! - `status`: Show the space, session and version
//! - `peers`: List discovered peers, optionally watching for changes
//! - `link`: Decide on a peer and record the link if approved
//! - `send`: Deliver a message to a peer
//!
//! ## Example
//!
//! ```bash
//! # Write a configuration
//! space-cli init --name "Alice" --url https://spaces.example.com/api --api-key KEY
//!
//! # Who else is here?
//! space-cli peers demo-space --watch 30
//!
//! # Link and send
//! space-cli link demo-space bob
//! space-cli send demo-space bob "Hello, space!"
//!
//! # Try everything against the in-memory service
//! space-cli --mock send demo-space demo-peer "hi" --link
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spacesync_client::{HttpTransport, Transport};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{init, link, peers, send, status};

/// Command-line front end for spacesync.
#[derive(Parser, Debug)]
#[command(name = "space-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory service instead of the real one (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a client configuration file
    Init {
        /// Display name shown to other peers
        #[arg(long, short)]
        name: String,

        /// Base URL of the space service
        #[arg(long)]
        url: Option<String>,

        /// API key of the space service
        #[arg(long)]
        api_key: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the space, session and version
    Status {
        /// Space name
        space: String,
    },

    /// List discovered peers
    Peers {
        /// Space name
        space: String,

        /// Keep polling and print changes for this many seconds
        #[arg(long)]
        watch: Option<u64>,
    },

    /// Decide on a peer and record the link if approved
    Link {
        /// Space name
        space: String,

        /// Peer actor id
        peer: String,
    },

    /// Deliver a message to a peer
    Send {
        /// Space name
        space: String,

        /// Peer actor id
        peer: String,

        /// Message to deliver
        message: String,

        /// Try to link to the peer first
        #[arg(long)]
        link: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = config::resolve_path(cli.config)?;

    if let Commands::Init {
        name,
        url,
        api_key,
        force,
    } = &cli.command
    {
        return init::run(&config_path, name, url.as_deref(), api_key.as_deref(), *force);
    }

    let config = config::load_or_default(&config_path)?;

    if cli.mock {
        let space = space_of(&cli.command);
        run(config, commands::mock_service(space), cli.command).await
    } else {
        let transport = HttpTransport::new(&config.service.base_url, &config.service.api_key)
            .context("Failed to create HTTP transport")?;
        run(config, transport, cli.command).await
    }
}

async fn run<T: Transport + 'static>(
    config: spacesync_client::ClientConfig,
    transport: T,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Init { .. } => Ok(()),
        Commands::Status { space } => {
            let client = commands::connect(config, transport, &space).await?;
            status::run(&client).await
        }
        Commands::Peers { space, watch } => {
            let client = commands::connect(config, transport, &space).await?;
            peers::run(&client, watch).await
        }
        Commands::Link { space, peer } => {
            let client = commands::connect(config, transport, &space).await?;
            link::run(&client, &peer.as_str().into()).await
        }
        Commands::Send {
            space,
            peer,
            message,
            link,
        } => {
            let client = commands::connect(config, transport, &space).await?;
            send::run(&client, &peer.as_str().into(), &message, link).await
        }
    }
}

fn space_of(command: &Commands) -> &str {
    match command {
        Commands::Init { .. } => "",
        Commands::Status { space }
        | Commands::Peers { space, .. }
        | Commands::Link { space, .. }
        | Commands::Send { space, .. } => space,
    }
}
