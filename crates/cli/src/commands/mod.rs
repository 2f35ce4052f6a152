//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;

mod mine;
mod simulate;
mod verify;

#[derive(Subcommand)]
pub enum Commands {
    /// Mine blocks on a local chain
    Mine(mine::MineArgs),
    /// Verify a chain exported as JSON
    Verify(verify::VerifyArgs),
    /// Run an in-process quorum network
    Simulate(simulate::SimulateArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Mine(args) => mine::run(args),
        Commands::Verify(args) => verify::run(args),
        Commands::Simulate(args) => simulate::run(args),
    }
}
