//! Local mining command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use quorumchain_chain::{Blockchain, BlockchainConfig};
use quorumchain_consensus::ProofSearch;
use quorumchain_core::Block;
use quorumchain_storage::{ChainStore, Storage};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Args)]
pub struct MineArgs {
    /// Number of blocks to mine
    #[arg(short, long, default_value = "1")]
    blocks: usize,

    /// Recipient of the mining rewards
    #[arg(short, long, default_value = "miner")]
    miner: String,

    /// Reward paid per block
    #[arg(long, default_value = "1")]
    reward: u64,

    /// Directory holding a persistent chain to extend
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Write the resulting chain to this file as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: MineArgs) -> Result<()> {
    let config = BlockchainConfig {
        mining_reward: args.reward,
        ..BlockchainConfig::default()
    };

    let storage = match &args.data_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory: {:?}", dir))?;
            Some(Storage::open(dir).with_context(|| "Failed to open storage")?)
        }
        None => None,
    };
    let store = storage.as_ref().map(ChainStore::new);

    let mut blockchain = match &store {
        Some(store) => {
            store.init_genesis()?;
            let blocks = store.load_chain()?;
            Blockchain::from_blocks(blocks, config).context("Stored chain is invalid")?
        }
        None => Blockchain::with_config(config),
    };

    println!(
        "{} {} block(s) on top of #{}",
        "Mining".bold().cyan(),
        args.blocks,
        blockchain.last_block().index
    );
    println!();

    let mined = mine_blocks(&mut blockchain, args.blocks, &args.miner, store.as_ref())?;
    for (block, elapsed_ms) in &mined {
        println!(
            "  {} {} proof {} {}",
            format!("#{}", block.index).bright_black(),
            block.hash().to_hex()[..16].bright_yellow(),
            block.proof.to_string().bright_cyan(),
            format!("({} ms)", elapsed_ms).bright_black()
        );
    }

    if let Some(storage) = &storage {
        storage.flush()?;
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&blockchain.snapshot())?;
        fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        println!();
        println!(
            "{}  Saved chain to: {}",
            "✓".green().bold(),
            path.display().to_string().bright_black()
        );
    }

    println!();
    println!(
        "{} Chain length is now {}",
        "✓".green().bold(),
        blockchain.length().to_string().bright_cyan()
    );
    Ok(())
}

/// Mine `count` blocks, each on a dedicated proof-search worker, persisting
/// them to `store` when one is given. Returns the blocks with their search
/// time in milliseconds.
fn mine_blocks(
    blockchain: &mut Blockchain,
    count: usize,
    miner: &str,
    store: Option<&ChainStore<'_>>,
) -> Result<Vec<(Block, u128)>> {
    let mut mined = Vec::with_capacity(count);
    for _ in 0..count {
        let started = Instant::now();
        let proof = ProofSearch::spawn(blockchain.last_block().proof)?.wait()?;
        let elapsed = started.elapsed().as_millis();

        let block = blockchain.forge_then(miner, proof, |block| match store {
            Some(store) => store.append_block(block).map_err(anyhow::Error::from),
            None => Ok(()),
        })?;
        mined.push((block, elapsed));
    }
    Ok(mined)
}
