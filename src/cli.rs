//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// token-gate - bearer-token verification and OAuth 2.0 code-flow proxy
#[derive(Parser, Debug)]
#[command(name = "token-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "TOKEN_GATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "TOKEN_GATE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "TOKEN_GATE_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "TOKEN_GATE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "TOKEN_GATE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the server (default)
    Serve,

    /// Fetch the provider's signing keys and list them
    CheckKeys,

    /// Decode a token, compare it with the live key set and verify it
    InspectToken {
        /// The raw bearer token (without the `Bearer ` prefix)
        #[arg(required = true)]
        token: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_server_mode() {
        let cli = Cli::try_parse_from(["token-gate"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_inspect_token() {
        let cli = Cli::try_parse_from(["token-gate", "--log-level", "debug", "inspect-token", "a.b.c"])
            .unwrap();
        assert!(matches!(cli.command, Some(Command::InspectToken { ref token }) if token == "a.b.c"));
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn host_and_port_overrides() {
        let cli = Cli::try_parse_from(["token-gate", "-p", "9000", "--host", "0.0.0.0", "serve"])
            .unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.host.as_deref(), Some("0.0.0.0"));
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
