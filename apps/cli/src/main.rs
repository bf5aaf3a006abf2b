//! # imulink CLI
//!
//! Command-line entry points for the telemetry bridge.
//!
//! ```bash
//! # run the relay stage against imulink.toml
//! imulink relay --config imulink.toml
//!
//! # stream synthetic samples over the configured upstream link
//! imulink stream --duration 10
//!
//! # list candidate USB devices
//! imulink scan --vendor 0x2E8A
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use commands::{RelayCommand, ScanCommand, StreamCommand};

/// imulink - IMU telemetry bridge tools
#[derive(Parser, Debug)]
#[command(name = "imulink")]
#[command(about = "Telemetry bridge between IMU event sources, serial/USB links and CAN", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay stage (line assembly, command replies, passthrough,
    /// CAN re-encoding)
    Relay(RelayCommand),

    /// Stream coalesced samples over the upstream link
    Stream(StreamCommand),

    /// Enumerate USB devices matching the vendor allow-list
    Scan(ScanCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("imulink_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Relay(cmd) => cmd.execute(),
        Commands::Stream(cmd) => cmd.execute(),
        Commands::Scan(cmd) => cmd.execute(),
    }
}
