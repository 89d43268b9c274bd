use crate::block_index::{BlockTree, NodeId};
use crate::error::{QueryError, QueryResult};

/// Active Chain
///
/// The branch the engine currently considers best, stored genesis -> tip as
/// arena ids so lookup by height and membership tests are O(1).
#[derive(Debug, Clone, Default)]
pub struct ActiveChain {
    chain: Vec<NodeId>,
}

impl ActiveChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain ending at `tip` by walking parent links to the root.
    pub fn from_tip(tree: &BlockTree, tip: NodeId) -> QueryResult<Self> {
        let tip_node = tree.get(tip)?;
        let mut chain = vec![tip; tip_node.height as usize + 1];
        let mut cursor = Some(tip);
        let mut expected = tip_node.height as i64;

        while let Some(id) = cursor {
            let node = tree.node(id);
            if node.height as i64 != expected {
                return Err(QueryError::Inconsistent(format!(
                    "block {} at height {} where {} was expected",
                    node.hash, node.height, expected
                )));
            }
            chain[node.height as usize] = id;
            cursor = node.parent;
            expected -= 1;
        }

        if expected != -1 {
            return Err(QueryError::Inconsistent(format!(
                "chain ending at {} does not reach height 0",
                tip_node.hash
            )));
        }
        Ok(Self { chain })
    }

    pub fn tip(&self) -> Option<NodeId> {
        self.chain.last().copied()
    }

    /// Height of the tip, -1 for an empty chain
    pub fn height(&self) -> i64 {
        self.chain.len() as i64 - 1
    }

    pub fn genesis(&self) -> Option<NodeId> {
        self.chain.first().copied()
    }

    pub fn at(&self, height: i64) -> Option<NodeId> {
        if height < 0 {
            return None;
        }
        self.chain.get(height as usize).copied()
    }

    /// Like `at`, but reports out-of-range heights
    pub fn at_checked(&self, height: i64) -> QueryResult<NodeId> {
        self.at(height).ok_or(QueryError::OutOfRange {
            height,
            tip: self.height(),
        })
    }

    pub fn contains(&self, tree: &BlockTree, id: NodeId) -> bool {
        match tree.get(id) {
            Ok(node) => self.at(node.height as i64) == Some(id),
            Err(_) => false,
        }
    }

    /// Active-chain successor of `id`, if `id` is on the chain and not the tip
    pub fn next(&self, tree: &BlockTree, id: NodeId) -> Option<NodeId> {
        if !self.contains(tree, id) {
            return None;
        }
        self.at(tree.node(id).height as i64 + 1)
    }

    /// Last block shared by the active chain and the branch ending at `id`.
    ///
    /// `None` when the branch is rooted somewhere other than the active
    /// chain's genesis.
    pub fn find_fork(&self, tree: &BlockTree, id: NodeId) -> Option<NodeId> {
        if self.chain.is_empty() {
            return None;
        }
        let node = tree.get(id).ok()?;
        let mut cursor = if node.height as i64 > self.height() {
            tree.ancestor(id, self.height() as u32)?
        } else {
            id
        };
        loop {
            if self.contains(tree, cursor) {
                return Some(cursor);
            }
            cursor = tree.parent(cursor)?;
        }
    }
}
