//! Soft-Fork Majority Voting
//!
//! Counts how many recent blocks signal at least a given version, the same
//! window the engine uses to decide when upgraded rules start to bind.

use serde::Serialize;

use crate::block_index::{BlockTree, NodeId};
use crate::config::ChainParams;
use crate::error::{QueryError, QueryResult};

/// Largest window a caller may ask to scan
pub const MAX_MAJORITY_WINDOW: usize = 100_000;

/// Version-gated deployments reported in the blockchain summary
pub const DEPLOYMENTS: &[(&str, i32)] = &[("bip34", 2), ("bip66", 3), ("bip65", 4)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MajorityStatus {
    /// True once `found >= required`
    #[serde(rename = "status")]
    pub satisfied: bool,
    pub found: usize,
    pub required: usize,
    pub window: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftForkStatus {
    pub id: String,
    pub version: i32,
    /// Progress toward enforcing the new rules on new-version blocks
    pub enforce: MajorityStatus,
    /// Progress toward rejecting old-version blocks
    pub reject: MajorityStatus,
}

/// Blocks among the last `window` (from `start` back) with version >= `min_version`
pub fn count_upgraded(tree: &BlockTree, start: Option<NodeId>, min_version: i32, window: usize) -> QueryResult<usize> {
    if window > MAX_MAJORITY_WINDOW {
        return Err(QueryError::InputTooLarge {
            requested: window,
            cap: MAX_MAJORITY_WINDOW,
        });
    }

    let mut found = 0;
    let mut cursor = start;
    for _ in 0..window {
        let Some(id) = cursor else { break };
        let node = tree.get(id)?;
        if node.version >= min_version {
            found += 1;
        }
        cursor = node.parent;
    }
    Ok(found)
}

pub fn majority_status(
    tree: &BlockTree,
    start: Option<NodeId>,
    min_version: i32,
    window: usize,
    required: usize,
) -> QueryResult<MajorityStatus> {
    let found = count_upgraded(tree, start, min_version, window)?;
    Ok(MajorityStatus {
        satisfied: found >= required,
        found,
        required,
        window,
    })
}

/// Enforce and reject progress for one deployment, sharing a single count
pub fn soft_fork_status(
    tree: &BlockTree,
    id: &str,
    version: i32,
    tip: Option<NodeId>,
    params: &ChainParams,
) -> QueryResult<SoftForkStatus> {
    let window = params.majority_window;
    let found = count_upgraded(tree, tip, version, window)?;
    let status = |required: usize| MajorityStatus {
        satisfied: found >= required,
        found,
        required,
        window,
    };
    Ok(SoftForkStatus {
        id: id.to_string(),
        version,
        enforce: status(params.majority_enforce_upgrade),
        reject: status(params.majority_reject_outdated),
    })
}

pub fn soft_forks(tree: &BlockTree, tip: Option<NodeId>, params: &ChainParams) -> QueryResult<Vec<SoftForkStatus>> {
    DEPLOYMENTS
        .iter()
        .map(|(id, version)| soft_fork_status(tree, id, *version, tip, params))
        .collect()
}
