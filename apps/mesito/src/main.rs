//! mesito binary: `mesito setup` and `mesito serve`.

use clap::Parser;
use mesito::cli::{self, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    cli::init_tracing();

    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "mesito failed");
            ExitCode::FAILURE
        }
    }
}
