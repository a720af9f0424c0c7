// Host tooling: unwrap/expect/panic are acceptable here.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod cargo;
mod check;
mod doc;
mod flash;
mod plan;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Robot board development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the firmware and run it on the board via probe-rs
    Flash {
        /// Build and flash release version
        #[arg(short, long)]
        release: bool,
    },
    /// Check the hardware build, the host build, clippy and formatting
    Check,
    /// Run unit, integration and doc tests on the host
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Build and optionally open documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Print the clock tree, PWM and tick timing the board boots with
    Plan {
        /// Run from an external crystal of this many MHz instead of the HSI
        #[arg(long)]
        hse_mhz: Option<u32>,
        /// SYSCLK target in MHz
        #[arg(long, default_value_t = 168)]
        sysclk_mhz: u32,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Flash { release } => flash::run(release),
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
        Commands::Doc { open } => doc::run(open),
        Commands::Plan {
            hse_mhz,
            sysclk_mhz,
            json,
        } => plan::run(hse_mhz, sysclk_mhz, json),
    }
}
