use serde::Serialize;

use crate::chain_state::ChainState;
use crate::chainwork::ChainWork;
use crate::config::ChainParams;
use crate::difficulty::{network_difficulty, NextWorkRequired};
use crate::error::QueryResult;
use crate::softfork::{soft_forks, SoftForkStatus};
use crate::types::Hash256;

/// Blockchain processing summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSummary {
    pub chain: String,
    pub blocks: i64,
    /// Height of the best known header, -1 if none
    pub headers: i64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: Hash256,
    pub difficulty: f64,
    #[serde(rename = "chainwork")]
    pub chain_work: ChainWork,
    pub pruned: bool,
    #[serde(rename = "pruneheight", skip_serializing_if = "Option::is_none")]
    pub prune_height: Option<u32>,
    pub softforks: Vec<SoftForkStatus>,
}

/// Lowest height whose block data is still stored, following the active tip
/// back through ancestors that have data.
pub fn prune_height(state: &ChainState) -> QueryResult<u32> {
    let (tip, _) = state.tip()?;
    let tree = &state.tree;
    let mut block = tip;
    while let Some(parent) = tree.parent(block) {
        if !tree.node(parent).status.have_data {
            break;
        }
        block = parent;
    }
    Ok(tree.node(block).height)
}

pub fn chain_summary(
    state: &ChainState,
    params: &ChainParams,
    next_work: &dyn NextWorkRequired,
) -> QueryResult<ChainSummary> {
    let (tip_id, tip) = state.tip()?;
    let headers = match state.best_header {
        Some(id) => state.tree.get(id)?.height as i64,
        None => -1,
    };
    let prune_height = if state.pruned {
        Some(prune_height(state)?)
    } else {
        None
    };

    Ok(ChainSummary {
        chain: params.network.as_str().to_string(),
        blocks: state.active.height(),
        headers,
        best_block_hash: tip.hash,
        difficulty: network_difficulty(state, None, params, next_work)?,
        chain_work: tip.chain_work,
        pruned: state.pruned,
        prune_height,
        softforks: soft_forks(&state.tree, Some(tip_id), params)?,
    })
}
