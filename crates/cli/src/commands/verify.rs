//! Chain verification command.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use quorumchain_consensus::{BlockValidator, ChainSnapshot};
use quorumchain_core::Block;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct VerifyArgs {
    /// JSON file holding a `GET /chain` response or a bare block array
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChainFile {
    Snapshot(ChainSnapshot),
    Blocks(Vec<Block>),
}

pub fn run(args: VerifyArgs) -> Result<()> {
    let blocks = load_chain_file(&args.path)?;

    println!();
    println!(
        "{} {} ({} blocks)",
        "Verifying".bold().cyan(),
        args.path.display(),
        blocks.len()
    );
    println!();

    match BlockValidator::validate_rooted_chain(&blocks) {
        Ok(()) => {
            let tip = blocks.last().map(Block::hash).unwrap_or_default();
            println!("{}  Chain is valid", "✓".green().bold());
            println!("    Tip: {}", tip.to_hex().bright_yellow());
            Ok(())
        }
        Err(e) => {
            println!("{}  Chain is invalid: {}", "✗".red().bold(), e);
            bail!("verification failed")
        }
    }
}

fn load_chain_file(path: &Path) -> Result<Vec<Block>> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let parsed: ChainFile =
        serde_json::from_str(&raw).with_context(|| format!("{:?} is not a chain", path))?;

    match parsed {
        ChainFile::Snapshot(snapshot) => {
            if snapshot.length != snapshot.chain.len() {
                bail!(
                    "reported length {} does not match {} blocks",
                    snapshot.length,
                    snapshot.chain.len()
                );
            }
            Ok(snapshot.chain)
        }
        ChainFile::Blocks(blocks) => Ok(blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumchain_chain::Blockchain;

    fn write_json(dir: &tempfile::TempDir, name: &str, value: &impl serde::Serialize) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_load_snapshot_and_bare_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut blockchain = Blockchain::new();
        blockchain.mine("me").unwrap();

        let snapshot = write_json(&dir, "snapshot.json", &blockchain.snapshot());
        let bare = write_json(&dir, "bare.json", &blockchain.blocks());

        assert_eq!(load_chain_file(&snapshot).unwrap(), blockchain.blocks());
        assert_eq!(load_chain_file(&bare).unwrap(), blockchain.blocks());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = Blockchain::new().snapshot();
        snapshot.length = 3;
        let path = write_json(&dir, "chain.json", &snapshot);

        assert!(load_chain_file(&path).is_err());
    }

    #[test]
    fn test_run_flags_tampered_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mut blockchain = Blockchain::new();
        blockchain.mine("me").unwrap();
        let mut blocks = blockchain.blocks().to_vec();
        blocks[1].proof += 1;

        let good = write_json(&dir, "good.json", &blockchain.snapshot());
        let bad = write_json(&dir, "bad.json", &blocks);

        assert!(run(VerifyArgs { path: good }).is_ok());
        assert!(run(VerifyArgs { path: bad }).is_err());
    }
}
