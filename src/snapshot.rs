//! Snapshot Loader
//!
//! Reads a JSON dump of node state (block index, active tip, mempool, coins)
//! and rebuilds the in-memory structures the queries run against.
//!
//! Blocks must be listed parents first.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tracing::info;

use crate::block_index::{BlockHeader, BlockStatus, BlockTree, ValidityLevel};
use crate::chain::ActiveChain;
use crate::chain_state::ChainState;
use crate::config::{ChainParams, Network};
use crate::mempool::{Mempool, MempoolEntry};
use crate::session::NodeState;
use crate::types::{Hash256, TxId};
use crate::utxo::{Coins, CoinsStats, MemoryCoinsView};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotBlock {
    pub hash: Hash256,
    /// Omitted or all zeros for the genesis block
    #[serde(default)]
    pub prev_hash: Hash256,
    pub version: i32,
    #[serde(default)]
    pub merkle_root: Hash256,
    pub time: u32,
    /// Compact target as hex, e.g. "207fffff"
    pub bits: String,
    #[serde(default)]
    pub nonce: Hash256,
    /// Equihash solution as hex
    #[serde(default)]
    pub solution: String,
    #[serde(default = "default_tx_count")]
    pub tx_count: u32,
    pub validity: ValidityLevel,
    #[serde(default)]
    pub have_data: bool,
    #[serde(default)]
    pub have_undo: bool,
    /// The block itself failed validation
    #[serde(default)]
    pub failed: bool,
}

fn default_tx_count() -> u32 {
    1
}

impl SnapshotBlock {
    fn header(&self) -> Result<BlockHeader, Box<dyn Error>> {
        let trimmed = self.bits.trim_start_matches("0x");
        let bits = u32::from_str_radix(trimmed, 16)
            .map_err(|e| format!("Invalid bits '{}' for block {}: {}", self.bits, self.hash, e))?;
        let solution = hex::decode(&self.solution)
            .map_err(|e| format!("Invalid solution for block {}: {}", self.hash, e))?;
        Ok(BlockHeader {
            hash: self.hash,
            prev_hash: self.prev_hash,
            version: self.version,
            merkle_root: self.merkle_root,
            time: self.time,
            bits,
            nonce: self.nonce,
            solution,
            tx_count: self.tx_count,
        })
    }

    fn status(&self) -> BlockStatus {
        BlockStatus {
            validity: self.validity,
            have_data: self.have_data,
            have_undo: self.have_undo,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCoins {
    pub txid: TxId,
    #[serde(flatten)]
    pub coins: Coins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub network: Network,
    #[serde(default)]
    pub blocks: Vec<SnapshotBlock>,
    /// Missing means an empty active chain
    #[serde(default)]
    pub active_tip: Option<Hash256>,
    /// Defaults to the active tip
    #[serde(default)]
    pub best_header: Option<Hash256>,
    #[serde(default)]
    pub pruned: bool,
    #[serde(default)]
    pub mempool: Vec<MempoolEntry>,
    #[serde(default)]
    pub coins: Vec<SnapshotCoins>,
    /// Defaults to the active tip
    #[serde(default)]
    pub coins_best_block: Option<Hash256>,
    #[serde(default)]
    pub coins_stats: Option<CoinsStats>,
}

impl SnapshotFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read snapshot {}: {}", path.display(), e))?;
        let snapshot: SnapshotFile = serde_json::from_str(&data)?;
        info!(
            path = %path.display(),
            network = snapshot.network.as_str(),
            blocks = snapshot.blocks.len(),
            mempool = snapshot.mempool.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }

    pub fn chain_state(&self) -> Result<ChainState, Box<dyn Error>> {
        let mut tree = BlockTree::new();
        for block in &self.blocks {
            tree.insert(block.header()?, block.status())?;
        }
        for block in self.blocks.iter().filter(|b| b.failed) {
            let id = tree
                .lookup(&block.hash)
                .ok_or_else(|| format!("Block {} vanished from index", block.hash))?;
            tree.mark_failed(id)?;
        }

        let active = match &self.active_tip {
            Some(hash) => ActiveChain::from_tip(&tree, tree.lookup_node(hash)?.0)?,
            None => ActiveChain::new(),
        };
        let mut state = ChainState::new(tree, active);
        if let Some(hash) = &self.best_header {
            state.best_header = Some(state.tree.lookup_node(hash)?.0);
        }
        state.pruned = self.pruned;
        Ok(state)
    }

    pub fn mempool(&self) -> Mempool {
        let mut pool = Mempool::new();
        for entry in &self.mempool {
            pool.insert(entry.clone());
        }
        pool
    }

    pub fn coins_view(&self) -> MemoryCoinsView {
        MemoryCoinsView {
            best_block: self
                .coins_best_block
                .or(self.active_tip)
                .unwrap_or(Hash256::ZERO),
            coins: self.coins.iter().map(|c| (c.txid, c.coins.clone())).collect(),
            stats: self.coins_stats.clone(),
        }
    }

    /// Build the shared node state, consuming the snapshot
    pub fn into_node_state(self, params: ChainParams) -> Result<NodeState, Box<dyn Error>> {
        let chain = self.chain_state()?;
        let mempool = self.mempool();
        let coins = self.coins_view();
        Ok(NodeState::new(chain, mempool, params, Box::new(coins)))
    }
}
