use std::process::ExitCode;

use clap::Parser;
use scripts::cli::Cli;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries only command output
    tracing_subscriber::fmt()
        .pretty()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let Cli { config, command, .. } = cli;
    match command.run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(tx = ?e.tx_hash(), "{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
