//! Implementation of the CLI commands.

use super::{Cli, Command, ServeArgs};
use crate::api::{self, AppState, RouterOptions};
use mesito_core::{RedbStore, StoreError};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Run the parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Setup(args) => cmd_setup(&args.database, args.force),
        Command::Serve(args) => cmd_serve(&args).await,
    }
}

/// Create the database tables.
pub fn cmd_setup(database: &Path, force: bool) -> Result<(), CliError> {
    tracing::info!(database = %database.display(), "Creating the database tables...");
    RedbStore::create(database, force)?;
    tracing::info!("The database tables have been created.");
    Ok(())
}

/// Serve the API until SIGINT or SIGTERM.
pub async fn cmd_serve(args: &ServeArgs) -> Result<(), CliError> {
    let store = RedbStore::open(&args.database)?;
    let state = AppState::new(store);

    let options = RouterOptions {
        cors_allowed_all_origins: args.cors_allowed_all_origins,
        static_dir: args.static_dir.clone(),
    };
    let router = api::create_router(state, &options);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind { addr, source })?;

    tracing::info!(
        %addr,
        cors_allowed_all_origins = options.cors_allowed_all_origins,
        static_dir = %options.static_dir.display(),
        "Serving forever on port {} ...",
        args.port
    );

    api::serve(listener, router).await.map_err(CliError::Serve)?;

    tracing::info!("Goodbye.");
    Ok(())
}
