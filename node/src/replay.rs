//! Offline replay of signed transactions against an in-memory state.

use anyhow::{Context, Result};
use commonware_codec::DecodeExt;
use commonware_utils::from_hex_formatted;
use nexus_execution::{EngineConfig, Flags, Layer, Memory, Output, State};
use nexus_types::{
    execution::{Key, Transaction, Value},
    Address, Register,
};
use tracing::{debug, info, warn};

/// Outcome counts of a replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub accepted: usize,
    pub rejected: usize,
    /// Transactions dropped for a nonce mismatch.
    pub dropped: usize,
    pub cost: u64,
}

/// Write the configured registers into `state`.
pub fn seed(state: &mut Memory, registers: &[(Address, Register)]) -> Result<()> {
    for (address, register) in registers {
        if !register.is_valid() {
            anyhow::bail!("genesis register {address} has an invalid checksum");
        }
        state
            .insert(Key::Register(*address), Value::Register(register.clone()))
            .with_context(|| format!("could not seed register {address}"))?;
    }
    Ok(())
}

/// Decode one hex transaction per line, skipping blank lines and `#` comments.
///
/// Transactions with an invalid signature are skipped with a warning.
pub fn decode_transactions(input: &str, max: usize) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let number = number + 1;
        let bytes = from_hex_formatted(line)
            .with_context(|| format!("line {number} is not hex"))?;
        let transaction = Transaction::decode(bytes.as_slice())
            .with_context(|| format!("line {number} is not a transaction"))?;
        if !transaction.verify() {
            warn!(line = number, "invalid signature; skipping transaction");
            continue;
        }
        if transactions.len() == max {
            anyhow::bail!("more than {max} transactions provided");
        }
        transactions.push(transaction);
    }
    Ok(transactions)
}

/// Execute `transactions` as one block. Changes are applied to `state` unless `dry_run`.
pub fn replay(
    state: &mut Memory,
    config: EngineConfig,
    transactions: Vec<Transaction>,
    dry_run: bool,
) -> Result<Summary> {
    let submitted = transactions.len();
    let (outputs, changes) = {
        let mut layer = Layer::new(&*state, config, Flags::BLOCK);
        let outputs = layer
            .execute(transactions)
            .context("block execution failed")?;
        (outputs, layer.commit())
    };

    let mut summary = Summary {
        dropped: submitted - outputs.len(),
        ..Summary::default()
    };
    for output in &outputs {
        match output {
            Output::Accepted { txid, cost } => {
                debug!(?txid, cost, "accepted");
                summary.accepted += 1;
                summary.cost = summary.cost.saturating_add(*cost);
            }
            Output::Rejected {
                txid,
                contract,
                kind,
                reason,
            } => {
                info!(?txid, contract, %kind, reason, "rejected");
                summary.rejected += 1;
            }
        }
    }

    if dry_run {
        info!(changes = changes.len(), "dry run; discarding changes");
    } else {
        state.apply(changes).context("could not apply changes")?;
    }
    Ok(summary)
}
