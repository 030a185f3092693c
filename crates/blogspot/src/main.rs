//! Blogspot - MCP server for writing and publishing Blogger posts.
//!
//! This is the main entry point for the blogspot CLI.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::*;
use config::Config;

#[derive(Parser)]
#[command(name = "blogspot")]
#[command(author, version, about = "MCP server for writing and publishing Blogger posts", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand (defaults to `serve` over stdio)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server
    Serve {
        /// Transport to serve on
        #[arg(short, long, value_enum, default_value = "stdio")]
        transport: Transport,
        /// Port for the HTTP transport (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage the stored Blogger credential
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// List the tools, resources and prompts the server registers
    Tools,
    /// Print version information
    Version,
}

impl Commands {
    fn log_destination(&self) -> LogDestination {
        match self {
            Commands::Serve {
                transport: Transport::Stdio,
                ..
            } => LogDestination::File,
            Commands::Serve { .. } | Commands::Auth { .. } => LogDestination::Stderr,
            Commands::Tools | Commands::Version => LogDestination::Quiet,
        }
    }
}

fn print_version() {
    println!("blogspot {}", env!("CARGO_PKG_VERSION"));
    println!("MCP protocol {}", blogspot_mcp::PROTOCOL_VERSION);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        transport: Transport::Stdio,
        port: None,
    });

    let log_file = init_logging(cli.verbose, command.log_destination());
    if let Some(ref path) = log_file {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    let result = match command {
        Commands::Serve { transport, port } => match Config::from_env() {
            Ok(config) => run_server(config, transport, port).await,
            Err(e) => {
                tracing::error!(error = %e, "Invalid configuration");
                Err(e.into())
            }
        },
        Commands::Auth { command } => handle_auth(command).await,
        Commands::Tools => list_tools().await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Exiting with error");
    }
    result
}
