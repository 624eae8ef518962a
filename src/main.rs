use clap::Parser;
use dotenvy::dotenv;
use tracing::error;

use ticketdesk::cli::{self, Cli};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Err(e) = ticketdesk::logging::init(&config.logging) {
        eprintln!("{e}");
        return std::process::ExitCode::FAILURE;
    }

    match cli::run(cli, config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
