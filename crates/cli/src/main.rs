//! quorumchain CLI entry point.

use clap::Parser;
use colored::Colorize;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "quorumchain")]
#[command(about = "A minimal proof-of-work and quorum blockchain", long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd) {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                std::process::exit(1);
            }
        }
        None => {
            println!("quorumchain - A minimal proof-of-work and quorum blockchain");
            println!("Run 'quorumchain --help' for usage information.");
        }
    }
}
