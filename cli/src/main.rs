//! ignition CLI binary
//!
//! Starts the JVM backend server as a detached daemon and inspects it.

use clap::{Parser, Subcommand};
use cli::{load_config, running_pid, start, start_summary, DEFAULT_CONFIG_PATH};
use ignition_core::utils::init_tracing;
use ignition_core::StartOptions;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "ignition")]
#[command(about = "Start supervisor for the ignition backend server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Launcher configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server and wait until it is confirmed
    Start {
        /// Start the JVM with a remote debugger agent
        #[arg(long)]
        debug: bool,
        /// Suspend the JVM until a debugger attaches (with --debug)
        #[arg(long)]
        suspend_start: bool,
    },
    /// Report whether the server recorded in the PID file is alive
    Status,
    /// Load and validate the configuration
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    if let Err(e) = init_tracing(level) {
        eprintln!("{}", e);
    }

    let result = match cli.command {
        Commands::Start {
            debug,
            suspend_start,
        } => match load_config(&cli.config) {
            Ok(config) => {
                let options = StartOptions {
                    debug: Some(debug),
                    suspend_start: Some(suspend_start),
                    verbose: Some(cli.verbose),
                };
                start(config, &options)
                    .await
                    .map(|report| println!("{}", start_summary(&report)))
            }
            Err(e) => Err(e),
        },
        Commands::Status => load_config(&cli.config)
            .and_then(|config| running_pid(&config))
            .map(|pid| println!("Server is running (pid {})", pid)),
        Commands::CheckConfig => load_config(&cli.config)
            .map(|_| println!("Configuration {} is valid", cli.config.display())),
    };

    if let Err(e) = result {
        error!("{} [{}]", e, e.code());
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
