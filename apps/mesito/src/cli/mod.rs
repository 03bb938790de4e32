//! # CLI
//!
//! Command-line interface of the mesito binary.
//!
//! ```text
//! mesito setup --database mesito.redb
//! mesito serve --database mesito.redb --port 8080 --cors-allowed-all-origins
//! ```
//!
//! Every option can also be given through its `MESITO_*` environment
//! variable.

mod commands;

pub use commands::{CliError, cmd_serve, cmd_setup, run};

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Minimalist Manufacturing Execution System.
#[derive(Debug, Parser)]
#[command(name = "mesito", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database tables.
    Setup(SetupArgs),

    /// Run the mesito server.
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SetupArgs {
    /// Path to the redb database file.
    #[arg(long, env = "MESITO_DATABASE")]
    pub database: PathBuf,

    /// Replace the database if it already exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Port on which to serve.
    #[arg(long, env = "MESITO_PORT")]
    pub port: u16,

    /// Path to the redb database file created by `mesito setup`.
    #[arg(long, env = "MESITO_DATABASE")]
    pub database: PathBuf,

    /// Address on which to serve.
    #[arg(long, env = "MESITO_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// If set, allows CORS on all origins.
    #[arg(
        long,
        env = "MESITO_CORS_ALLOWED_ALL_ORIGINS",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub cors_allowed_all_origins: bool,

    /// Directory with the front-end files.
    #[arg(long, env = "MESITO_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

/// Install the global tracing subscriber.
///
/// The filter defaults to `info` and can be overridden with `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
