// crates/deskflow-server/src/main.rs
// ============================================================================
// Module: Deskflow Server Entry Point
// Description: Binary launching the Deskflow HTTP server.
// Purpose: Load configuration, build the server, and serve until failure.
// Dependencies: clap, deskflow-config, deskflow-server, tokio
// ============================================================================

//! ## Overview
//! Thin binary wrapper: resolve the config path from the CLI or environment,
//! build the server from validated configuration, and serve. All failures
//! surface as typed errors through the process exit status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use clap::Parser;
use deskflow_config::DeskflowConfig;
use deskflow_server::AppServer;
use deskflow_server::ServerError;

// ============================================================================
// SECTION: CLI
// ============================================================================

/// Deskflow agent orchestration server.
#[derive(Parser)]
#[command(name = "deskflow-server", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Loads configuration and serves until the transport fails.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();
    let config = DeskflowConfig::load(cli.config.as_deref())
        .map_err(|err| ServerError::Config(err.to_string()))?;
    let server = AppServer::from_config(config)?;
    server.serve().await
}
