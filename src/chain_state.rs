//! Chain State Snapshot
//!
//! Everything the engine guards with its chain lock, bundled so queries can
//! borrow one consistent view:
//! - Block index tree (all known headers, forks included)
//! - Active chain
//! - Best known header (may run ahead of the active tip)
//! - Prune mode flag

use crate::block_index::{BlockIndexNode, BlockTree, NodeId};
use crate::chain::ActiveChain;
use crate::error::{QueryError, QueryResult};

#[derive(Debug, Default)]
pub struct ChainState {
    pub tree: BlockTree,
    pub active: ActiveChain,
    pub best_header: Option<NodeId>,
    pub pruned: bool,
}

impl ChainState {
    pub fn new(tree: BlockTree, active: ActiveChain) -> Self {
        let best_header = active.tip();
        Self {
            tree,
            active,
            best_header,
            pruned: false,
        }
    }

    /// Switch the active chain to the branch ending at `tip`.
    pub fn set_tip(&mut self, tip: NodeId) -> QueryResult<()> {
        self.active = ActiveChain::from_tip(&self.tree, tip)?;
        let tip_work = self.tree.node(tip).chain_work;
        let header_behind = match self.best_header {
            Some(h) => self.tree.get(h)?.chain_work < tip_work,
            None => true,
        };
        if header_behind {
            self.best_header = Some(tip);
        }
        Ok(())
    }

    /// Active tip, or `Inconsistent` when there is none
    pub fn tip(&self) -> QueryResult<(NodeId, &BlockIndexNode)> {
        let id = self
            .active
            .tip()
            .ok_or_else(|| QueryError::Inconsistent("active chain is empty".to_string()))?;
        let node = self.tree.get(id).map_err(|_| {
            QueryError::Inconsistent(format!("active tip slot {} is not in the block index", id.0))
        })?;
        Ok((id, node))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.active.contains(&self.tree, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_index::test_util::*;
    use crate::block_index::{BlockStatus, ValidityLevel};

    #[test]
    fn test_set_tip_tracks_best_header() {
        let (mut tree, ids) = linear_tree(&[1, 1, 1]);
        let side = tree
            .insert(header(20, Some(tree.node(ids[0]).hash), 1), BlockStatus::headers_only(ValidityLevel::Tree))
            .unwrap();
        let active = ActiveChain::from_tip(&tree, ids[2]).unwrap();
        let mut state = ChainState::new(tree, active);
        assert_eq!(state.best_header, Some(ids[2]));

        state.set_tip(side).unwrap();
        assert_eq!(state.active.height(), 1);
        // A lower-work tip does not move the best header back
        assert_eq!(state.best_header, Some(ids[2]));
        assert!(state.contains(side));
        assert!(!state.contains(ids[2]));
    }

    #[test]
    fn test_empty_state_has_no_tip() {
        let state = ChainState::default();
        assert!(matches!(state.tip(), Err(QueryError::Inconsistent(_))));
    }
}
