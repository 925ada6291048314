//! Thermogate CLI - per-user front end for a heating controller.

use std::process;

use clap::Parser;
use thermogate::cli::{Cli, Commands, ConfigCommands, ServeArgs};
use thermogate::commands::{self, Output};
use thermogate::server;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = run_command(cli.command, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Log to stderr so JSON command output on stdout stays parseable.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

fn run_command(command: Commands, human: bool) -> thermogate::Result<()> {
    match command {
        Commands::Serve(args) => run_serve(&args),
        Commands::Config { command } => match command {
            ConfigCommands::Check { config } => {
                let path = commands::config_path(config)?;
                output(&commands::config_check(&path)?, human);
                Ok(())
            }
            ConfigCommands::Resolve { config, identity } => {
                let path = commands::config_path(config)?;
                output(&commands::config_resolve(&path, identity)?, human);
                Ok(())
            }
        },
    }
}

fn run_serve(args: &ServeArgs) -> thermogate::Result<()> {
    let (state, options) = commands::prepare_serve(args)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::start_server(state, &options))
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
