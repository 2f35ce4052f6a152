//! In-process quorum network simulation.
//!
//! Each round one node proposes a block, every online node receives and signs
//! it, and the signatures are gossiped back to every online node. Nodes then
//! try to commit. Offline nodes neither sign nor commit, so with enough of
//! them down the round fails and the block is discarded.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use quorumchain_chain::NodeLedger;
use quorumchain_core::{NodeId, Transaction};
use tracing::debug;

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of nodes in the network
    #[arg(short, long, default_value = "5")]
    nodes: usize,

    /// Number of proposal rounds
    #[arg(short, long, default_value = "3")]
    rounds: usize,

    /// Number of nodes that stay silent
    #[arg(long, default_value = "0")]
    offline: usize,
}

/// Outcome of one proposal round.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RoundReport {
    proposer: NodeId,
    signatures: usize,
    required: usize,
    committed_by: usize,
}

pub fn run(args: SimulateArgs) -> Result<()> {
    if args.nodes == 0 {
        bail!("a network needs at least one node");
    }
    if args.offline >= args.nodes {
        bail!("at least one node must stay online");
    }

    println!();
    println!(
        "{} {} nodes ({} offline), {} rounds",
        "Simulating".bold().cyan(),
        args.nodes,
        args.offline,
        args.rounds
    );
    println!();

    let mut ledgers = build_network(args.nodes);
    let online = args.nodes - args.offline;

    for round in 0..args.rounds {
        let report = run_round(&mut ledgers, online, round);
        let status = if report.committed_by > 0 {
            "committed".green().bold()
        } else {
            "discarded".red().bold()
        };
        println!(
            "  {} proposer {} signatures {}/{} {} on {} node(s)",
            format!("round {}", round + 1).bright_black(),
            report.proposer.as_str().bright_yellow(),
            report.signatures,
            report.required,
            status,
            report.committed_by
        );
    }

    println!();
    println!("{}", "Final chains:".bold());
    for ledger in &ledgers {
        let tip = ledger.last_block();
        println!(
            "  {} length {} tip {}",
            ledger.node_id().as_str().bright_yellow(),
            ledger.chain().len(),
            tip.hash().to_hex()[..16].bright_black()
        );
    }
    println!();
    Ok(())
}

fn build_network(count: usize) -> Vec<NodeLedger> {
    let ids: Vec<NodeId> = (0..count).map(|i| NodeId::new(format!("node-{i}"))).collect();
    ids.iter()
        .map(|id| {
            let mut ledger = NodeLedger::new(id.clone());
            for peer in &ids {
                ledger.register_node(peer.clone());
            }
            ledger
        })
        .collect()
}

/// Run one round. The first `online` ledgers participate; the proposer
/// rotates among them.
fn run_round(ledgers: &mut [NodeLedger], online: usize, round: usize) -> RoundReport {
    let proposer = round % online;
    let block = ledgers[proposer].propose_block(vec![Transaction::new(
        format!("user-{round}"),
        "merchant",
        (round as u64 + 1) * 10,
    )]);
    let hash = block.hash();

    let signers: Vec<NodeId> = ledgers[..online]
        .iter_mut()
        .filter_map(|ledger| {
            ledger
                .receive_block(block.clone())
                .then(|| ledger.node_id().clone())
        })
        .collect();

    for ledger in ledgers[..online].iter_mut() {
        for signer in &signers {
            if let Err(e) = ledger.record_signature(&hash, signer.clone()) {
                debug!(node = %ledger.node_id(), error = %e, "signature not recorded");
            }
        }
    }

    let signatures = ledgers[proposer]
        .pending(&hash)
        .map(|block| block.signature_count())
        .unwrap_or_default();
    let required = ledgers[proposer].required_signatures();

    let mut committed_by = 0;
    for ledger in ledgers[..online].iter_mut() {
        if ledger.try_commit(&hash) {
            committed_by += 1;
        } else {
            ledger.discard(&hash);
        }
    }

    RoundReport {
        proposer: ledgers[proposer].node_id().clone(),
        signatures,
        required,
        committed_by,
    }
}
