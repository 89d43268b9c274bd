//! # Unspent Output Queries
//!
//! Read access to the UTXO set through the `CoinsView` collaborator, with an
//! optional mempool overlay:
//! - outputs created by pooled transactions are visible with 0 confirmations
//! - outputs spent by pooled transactions are hidden
//!
//! Aggregate statistics are passed through untouched; computing them means
//! walking the whole set, which is the engine's job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chain_state::ChainState;
use crate::error::{QueryError, QueryResult};
use crate::mempool::Mempool;
use crate::types::{Amount, Hash256, OutPoint, TxId, TxOut};

/// Unspent outputs of one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coins {
    pub height: u32,
    pub version: i32,
    pub coinbase: bool,
    /// Indexed by output number; `None` once spent
    pub outputs: Vec<Option<TxOut>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinsStats {
    pub height: u32,
    #[serde(rename = "bestblock")]
    pub best_block: Hash256,
    pub transactions: u64,
    #[serde(rename = "txouts")]
    pub tx_outs: u64,
    pub bytes_serialized: u64,
    pub hash_serialized: Hash256,
    pub total_amount: Amount,
}

/// The engine's view of the UTXO set
pub trait CoinsView {
    fn best_block(&self) -> Hash256;
    fn coins(&self, txid: &TxId) -> Option<Coins>;
    fn stats(&self) -> Option<CoinsStats>;
}

/// In-memory coins view, filled from snapshots
#[derive(Debug, Clone, Default)]
pub struct MemoryCoinsView {
    pub best_block: Hash256,
    pub coins: BTreeMap<TxId, Coins>,
    pub stats: Option<CoinsStats>,
}

impl CoinsView for MemoryCoinsView {
    fn best_block(&self) -> Hash256 {
        self.best_block
    }

    fn coins(&self, txid: &TxId) -> Option<Coins> {
        self.coins.get(txid).cloned()
    }

    fn stats(&self) -> Option<CoinsStats> {
        self.stats.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxOutInfo {
    #[serde(rename = "bestblock")]
    pub best_block: Hash256,
    pub confirmations: u32,
    pub value: Amount,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: String,
    pub version: i32,
    pub coinbase: bool,
}

/// Details of an unspent output, or `None` if it does not exist or is spent.
///
/// Pass a mempool to include unconfirmed outputs and hide outputs that pooled
/// transactions already spend.
pub fn tx_out(
    state: &ChainState,
    view: &dyn CoinsView,
    mempool: Option<&Mempool>,
    txid: &TxId,
    n: u32,
) -> QueryResult<Option<TxOutInfo>> {
    let best_hash = view.best_block();
    let best = state
        .tree
        .lookup(&best_hash)
        .map(|id| state.tree.node(id))
        .ok_or_else(|| {
            QueryError::Inconsistent(format!("coins best block {} is not in the block index", best_hash))
        })?;

    if let Some(pool) = mempool {
        if pool.is_spent(&OutPoint { txid: *txid, n }) {
            return Ok(None);
        }
        if let Some(entry) = pool.get(txid) {
            return Ok(entry.outputs.get(n as usize).map(|out| TxOutInfo {
                best_block: best.hash,
                confirmations: 0,
                value: out.value,
                script_pubkey: out.script_pubkey.clone(),
                version: entry.version,
                // Pooled transactions are never coinbase
                coinbase: false,
            }));
        }
    }

    let coins = match view.coins(txid) {
        Some(c) => c,
        None => return Ok(None),
    };
    let out = match coins.outputs.get(n as usize) {
        Some(Some(out)) => out,
        _ => return Ok(None),
    };
    if coins.height > best.height {
        return Err(QueryError::Inconsistent(format!(
            "coins for {} at height {} above best block height {}",
            txid, coins.height, best.height
        )));
    }

    Ok(Some(TxOutInfo {
        best_block: best.hash,
        confirmations: best.height - coins.height + 1,
        value: out.value,
        script_pubkey: out.script_pubkey.clone(),
        version: coins.version,
        coinbase: coins.coinbase,
    }))
}

/// UTXO set statistics as reported by the engine
pub fn tx_out_set_info(view: &dyn CoinsView) -> Option<CoinsStats> {
    view.stats()
}
