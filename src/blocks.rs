//! Block Lookups
//!
//! Height/hash resolution against the active chain and header summaries.

use serde::Serialize;

use crate::block_index::NodeId;
use crate::chain_state::ChainState;
use crate::chainwork::ChainWork;
use crate::config::ChainParams;
use crate::difficulty::difficulty_from_bits;
use crate::error::{QueryError, QueryResult};
use crate::types::Hash256;

/// Length of a hash in display hex
const HASH_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockHeaderInfo {
    pub hash: Hash256,
    /// -1 when the block is not on the active chain
    pub confirmations: i64,
    pub height: u32,
    pub version: i32,
    #[serde(rename = "merkleroot")]
    pub merkle_root: Hash256,
    pub time: u32,
    pub nonce: Hash256,
    /// Equihash solution as hex
    pub solution: String,
    pub bits: String,
    pub difficulty: f64,
    #[serde(rename = "chainwork")]
    pub chain_work: ChainWork,
    #[serde(rename = "previousblockhash", skip_serializing_if = "Option::is_none")]
    pub previous_block_hash: Option<Hash256>,
    #[serde(rename = "nextblockhash", skip_serializing_if = "Option::is_none")]
    pub next_block_hash: Option<Hash256>,
}

/// Height of the active tip (-1 for an empty chain)
pub fn block_count(state: &ChainState) -> i64 {
    state.active.height()
}

pub fn best_block_hash(state: &ChainState) -> QueryResult<Hash256> {
    Ok(state.tip()?.1.hash)
}

/// Hash of the active-chain block at `height`
pub fn block_hash_at(state: &ChainState, height: i64) -> QueryResult<Hash256> {
    let id = state.active.at_checked(height)?;
    let node = state.tree.get(id).map_err(|_| {
        QueryError::Inconsistent(format!("active chain slot {} at height {} is not in the block index", id.0, height))
    })?;
    Ok(node.hash)
}

pub fn header_info(state: &ChainState, id: NodeId, params: &ChainParams) -> QueryResult<BlockHeaderInfo> {
    let node = state.tree.get(id)?;
    let confirmations = if state.contains(id) {
        state.active.height() - node.height as i64 + 1
    } else {
        -1
    };

    Ok(BlockHeaderInfo {
        hash: node.hash,
        confirmations,
        height: node.height,
        version: node.version,
        merkle_root: node.merkle_root,
        time: node.time,
        nonce: node.nonce,
        solution: hex::encode(&node.solution),
        bits: format!("{:08x}", node.bits),
        difficulty: difficulty_from_bits(node.bits, params.pow_limit_bits),
        chain_work: node.chain_work,
        previous_block_hash: node.parent.map(|p| state.tree.node(p).hash),
        next_block_hash: state
            .active
            .next(&state.tree, id)
            .and_then(|n| state.tree.get(n).ok())
            .map(|n| n.hash),
    })
}

pub fn header_by_hash(state: &ChainState, hash: &Hash256, params: &ChainParams) -> QueryResult<BlockHeaderInfo> {
    let (id, _) = state.tree.lookup_node(hash)?;
    header_info(state, id, params)
}

/// Resolve a "hash or height" argument.
///
/// Anything shorter than a full hash must be a plain decimal height on the
/// active chain.
pub fn resolve_block(state: &ChainState, locator: &str) -> QueryResult<NodeId> {
    if locator.len() < HASH_HEX_LEN {
        if locator.is_empty() || !locator.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QueryError::InvalidParameter(format!(
                "invalid block height '{}'",
                locator
            )));
        }
        let height: i64 = locator
            .parse()
            .map_err(|_| QueryError::InvalidParameter(format!("invalid block height '{}'", locator)))?;
        return state.active.at_checked(height);
    }

    let hash = Hash256::from_hex(locator)?;
    Ok(state.tree.lookup_node(&hash)?.0)
}
