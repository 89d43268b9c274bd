use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::chainwork::{block_proof, ChainWork};
use crate::error::{QueryError, QueryResult};
use crate::types::Hash256;

/// Block Index Tree
///
/// Arena of every block header the node has accepted, forks included.
/// Nodes are addressed by `NodeId` (their arena slot), which never changes
/// once assigned: the engine only appends, so ids held by a reader stay valid
/// across later inserts.

/// Stable index of a node inside the `BlockTree` arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// How far a block has been validated, in increasing order of thoroughness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidityLevel {
    Unknown,
    /// Header parsed, proof-of-work and timestamp checked
    Header,
    /// Parent found and header chain connects
    Tree,
    /// Transactions checked in isolation
    Transactions,
    /// Contextual checks against the chain passed
    Chain,
    /// Scripts and signatures verified
    Scripts,
}

/// Why a block is considered failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Failure {
    /// The block itself broke a consensus rule
    Invalid,
    /// Some ancestor did
    Ancestor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStatus {
    pub validity: ValidityLevel,
    pub have_data: bool,
    pub have_undo: bool,
    pub failure: Option<Failure>,
}

impl BlockStatus {
    pub fn headers_only(validity: ValidityLevel) -> Self {
        Self {
            validity,
            have_data: false,
            have_undo: false,
            failure: None,
        }
    }

    pub fn with_data(validity: ValidityLevel) -> Self {
        Self {
            validity,
            have_data: true,
            have_undo: validity >= ValidityLevel::Scripts,
            failure: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Header fields the engine hands over when it accepts a block
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub hash: Hash256,
    pub prev_hash: Hash256,
    pub version: i32,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: Hash256,
    /// Equihash solution bytes
    pub solution: Vec<u8>,
    pub tx_count: u32,
}

#[derive(Debug, Clone)]
pub struct BlockIndexNode {
    pub hash: Hash256,
    pub parent: Option<NodeId>,
    pub height: u32,
    pub version: i32,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: Hash256,
    pub solution: Vec<u8>,
    pub tx_count: u32,
    /// Transactions in this block and all ancestors; zero when any of them
    /// is missing full data
    pub chain_tx: u64,
    pub chain_work: ChainWork,
    pub status: BlockStatus,
}

#[derive(Debug, Default)]
pub struct BlockTree {
    nodes: Vec<BlockIndexNode>,
    by_hash: HashMap<Hash256, NodeId>,
    children: Vec<Vec<NodeId>>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a header. A zero `prev_hash` makes the node a root at height 0;
    /// otherwise the parent must already be present.
    pub fn insert(&mut self, header: BlockHeader, status: BlockStatus) -> QueryResult<NodeId> {
        if self.by_hash.contains_key(&header.hash) {
            return Err(QueryError::Inconsistent(format!(
                "block {} already indexed",
                header.hash
            )));
        }

        let parent = if header.prev_hash.is_zero() {
            None
        } else {
            Some(self.lookup(&header.prev_hash).ok_or_else(|| {
                QueryError::NotFound(format!("parent block {}", header.prev_hash))
            })?)
        };

        let proof = block_proof(header.bits);
        let (height, chain_work, parent_chain_tx, parent_failed) = match parent {
            Some(p) => {
                let pn = &self.nodes[p.0];
                (pn.height + 1, pn.chain_work.add(&proof), pn.chain_tx, pn.status.is_failed())
            }
            // Roots count as "all ancestors have data"
            None => (0, proof, 0, false),
        };

        let chain_tx = if !status.have_data || (parent.is_some() && parent_chain_tx == 0) {
            0
        } else {
            parent_chain_tx + header.tx_count as u64
        };

        let mut status = status;
        if parent_failed && status.failure.is_none() {
            status.failure = Some(Failure::Ancestor);
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(BlockIndexNode {
            hash: header.hash,
            parent,
            height,
            version: header.version,
            merkle_root: header.merkle_root,
            time: header.time,
            bits: header.bits,
            nonce: header.nonce,
            solution: header.solution,
            tx_count: header.tx_count,
            chain_tx,
            chain_work,
            status,
        });
        self.children.push(Vec::new());
        self.by_hash.insert(header.hash, id);
        if let Some(p) = parent {
            self.children[p.0].push(id);
        }
        Ok(id)
    }

    /// Mark a block invalid and every descendant as failed through it
    pub fn mark_failed(&mut self, id: NodeId) -> QueryResult<()> {
        self.get(id)?;
        self.nodes[id.0].status.failure = Some(Failure::Invalid);

        let mut stack: Vec<NodeId> = self.children[id.0].clone();
        while let Some(child) = stack.pop() {
            let status = &mut self.nodes[child.0].status;
            if status.failure.is_none() {
                status.failure = Some(Failure::Ancestor);
            }
            stack.extend(self.children[child.0].iter().copied());
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> QueryResult<&BlockIndexNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| QueryError::NotFound(format!("block index slot {}", id.0)))
    }

    /// Node for an id handed out by this tree
    pub(crate) fn node(&self, id: NodeId) -> &BlockIndexNode {
        &self.nodes[id.0]
    }

    pub fn lookup(&self, hash: &Hash256) -> Option<NodeId> {
        self.by_hash.get(hash).copied()
    }

    pub fn lookup_node(&self, hash: &Hash256) -> QueryResult<(NodeId, &BlockIndexNode)> {
        let id = self
            .lookup(hash)
            .ok_or_else(|| QueryError::NotFound(format!("block {}", hash)))?;
        Ok((id, self.node(id)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Every node in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BlockIndexNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Ancestor of `id` at `height`, walking parent links
    pub fn ancestor(&self, id: NodeId, height: u32) -> Option<NodeId> {
        let mut current = id;
        let mut node = self.nodes.get(current.0)?;
        if height > node.height {
            return None;
        }
        while node.height > height {
            current = node.parent?;
            node = &self.nodes[current.0];
        }
        Some(current)
    }

    /// True if `id` or any ancestor carries a failure flag
    pub fn has_failed_ancestor(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            if node.status.is_failed() {
                return true;
            }
            cursor = node.parent;
        }
        false
    }
}
