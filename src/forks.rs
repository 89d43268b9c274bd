//! Fork detection utilities.
//!
//! Finds every tip of the block index (active chain and side branches),
//! measures how far each branch runs past its fork point with the active
//! chain, and labels it with its validation status.

use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::block_index::{BlockTree, NodeId, ValidityLevel};
use crate::chain_state::ChainState;
use crate::error::QueryResult;
use crate::types::Hash256;

/// Validation status of a chain tip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TipStatus {
    /// Tip of the active chain
    Active,
    /// The branch contains at least one invalid block
    Invalid,
    /// Full data for this block or an ancestor is missing
    HeadersOnly,
    /// Fully validated but not on the active chain
    ValidFork,
    /// Headers valid, blocks never fully validated
    ValidHeaders,
    /// Status flags fit none of the above
    Unknown,
}

impl TipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipStatus::Active => "active",
            TipStatus::Invalid => "invalid",
            TipStatus::HeadersOnly => "headers-only",
            TipStatus::ValidFork => "valid-fork",
            TipStatus::ValidHeaders => "valid-headers",
            TipStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the classifier knows about one tip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipFacts {
    pub on_active_chain: bool,
    /// The tip or one of its ancestors failed validation
    pub failed: bool,
    pub chain_tx: u64,
    pub validity: ValidityLevel,
}

/// First matching rule wins: active, invalid, headers-only, valid-fork,
/// valid-headers, unknown.
pub fn classify(facts: TipFacts) -> TipStatus {
    match facts {
        TipFacts { on_active_chain: true, .. } => TipStatus::Active,
        TipFacts { failed: true, .. } => TipStatus::Invalid,
        TipFacts { chain_tx: 0, .. } => TipStatus::HeadersOnly,
        TipFacts { validity, .. } if validity >= ValidityLevel::Scripts => TipStatus::ValidFork,
        TipFacts { validity, .. } if validity >= ValidityLevel::Tree => TipStatus::ValidHeaders,
        _ => TipStatus::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainTip {
    pub height: u32,
    pub hash: Hash256,
    /// Blocks between the tip and its fork point; `None` when the tip does
    /// not connect to the active chain
    #[serde(rename = "branchlen", skip_serializing_if = "Option::is_none")]
    pub branch_len: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TipStatus>,
}

/// Nodes nobody points at as a parent.
///
/// Starts from every node and removes each one that appears as some other
/// node's parent; what is left are the leaves of the forest.
pub fn leaf_nodes(tree: &BlockTree) -> HashSet<NodeId> {
    let mut tips: HashSet<NodeId> = tree.iter().map(|(id, _)| id).collect();
    for (_, node) in tree.iter() {
        if let Some(parent) = node.parent {
            tips.remove(&parent);
        }
    }
    tips
}

/// All chain tips, highest first; equal heights ordered by arena id.
pub fn chain_tips(state: &ChainState) -> QueryResult<Vec<ChainTip>> {
    let tree = &state.tree;
    let (active_tip, _) = state.tip()?;

    let mut ordered: BTreeSet<(Reverse<u32>, NodeId)> = leaf_nodes(tree)
        .into_iter()
        .map(|id| (Reverse(tree.node(id).height), id))
        .collect();
    // Always report the active tip, even if bookkeeping gave it a child
    ordered.insert((Reverse(tree.node(active_tip).height), active_tip));

    let mut tips = Vec::with_capacity(ordered.len());
    for (_, id) in ordered {
        let node = tree.node(id);
        let (branch_len, status) = match state.active.find_fork(tree, id) {
            Some(fork) => {
                let facts = TipFacts {
                    on_active_chain: state.contains(id),
                    failed: tree.has_failed_ancestor(id),
                    chain_tx: node.chain_tx,
                    validity: node.status.validity,
                };
                (Some(node.height - tree.node(fork).height), Some(classify(facts)))
            }
            None => (None, None),
        };
        tips.push(ChainTip {
            height: node.height,
            hash: node.hash,
            branch_len,
            status,
        });
    }
    Ok(tips)
}
