//! USOS backend-for-frontend CLI.
//!
//! Provides commands for:
//! - `serve`: Start the HTTP server
//! - `check-config`: Validate configuration and print a summary
//! - `set-role`: Grant or revoke the admin role

mod commands;
mod error;
mod output;

use std::future::Future;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckConfigArgs, ServeArgs, SetRoleArgs};
use error::CliError;
use output::Output;

/// USOS backend-for-frontend.
#[derive(Parser)]
#[command(name = "usos-bff", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve(ServeArgs),
    /// Validate configuration and print a summary.
    CheckConfig(CheckConfigArgs),
    /// Change the local role of a user.
    SetRole(SetRoleArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Serve(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Serve(args) => block_on(args.execute()),
        Commands::CheckConfig(args) => args.execute(),
        Commands::SetRole(args) => block_on(args.execute()),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

/// Run a command on a fresh multi-threaded runtime.
fn block_on<F>(future: F) -> Result<(), CliError>
where
    F: Future<Output = Result<(), CliError>>,
{
    tokio::runtime::Runtime::new()?.block_on(future)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["usos-bff", "serve", "--port", "9000", "-v"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve(args) if args.verbose));
    }

    #[test]
    fn test_parse_set_role() {
        assert!(Cli::try_parse_from(["usos-bff", "set-role", "100", "admin"]).is_ok());
        assert!(Cli::try_parse_from(["usos-bff", "set-role", "100", "root"]).is_err());
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::try_parse_from(["usos-bff", "check-config", "-c", "usos.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig(_)));
    }
}
