//! token-gate - bearer-token verification and OAuth 2.0 code-flow proxy

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use token_gate::{
    cli::{Cli, Command},
    config::Config,
    diagnostics,
    server::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            // Apply CLI overrides
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::CheckKeys) => run_check_keys(&config).await,
        Some(Command::InspectToken { token }) => run_inspect_token(&config, &token).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

async fn run_check_keys(config: &Config) -> ExitCode {
    match diagnostics::check_keys(config).await {
        Ok(report) => {
            print!("{report}");
            if report.key_ids.is_empty() {
                eprintln!("Key set contains no usable signing keys");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Key set check failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_inspect_token(config: &Config, token: &str) -> ExitCode {
    match diagnostics::inspect_token(config, token).await {
        Ok(report) => {
            print!("{report}");
            if report.verdict.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Token inspection failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        project = %config.provider.project_id,
        "Starting token-gate"
    );

    if let Err(e) = Server::new(config).run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
