//! Query Sessions
//!
//! `NodeState` owns the chain state and the mempool behind separate locks.
//! A `QuerySession` holds read guards on both for its whole lifetime, so every
//! query answered through it sees one consistent snapshot.
//!
//! Lock order is chain first, then mempool. Writers must take them in the
//! same order.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::blocks::{self, BlockHeaderInfo};
use crate::chain_info::{chain_summary, ChainSummary};
use crate::chain_state::ChainState;
use crate::config::ChainParams;
use crate::difficulty::{block_difficulty, network_difficulty, NextWorkRequired, NoRetarget};
use crate::error::{QueryError, QueryResult};
use crate::forks::{chain_tips, ChainTip};
use crate::mempool::{Mempool, MempoolEntryInfo, MempoolInfo};
use crate::metrics::{self, Timer};
use crate::softfork::{majority_status, MajorityStatus};
use crate::telemetry::truncate_hex;
use crate::types::{Hash256, TxId};
use crate::utxo::{self, CoinsStats, CoinsView, TxOutInfo};

pub struct NodeState {
    chain: RwLock<ChainState>,
    mempool: RwLock<Mempool>,
    params: ChainParams,
    coins: Box<dyn CoinsView + Send + Sync>,
    next_work: Box<dyn NextWorkRequired + Send + Sync>,
}

impl NodeState {
    pub fn new(
        chain: ChainState,
        mempool: Mempool,
        params: ChainParams,
        coins: Box<dyn CoinsView + Send + Sync>,
    ) -> Self {
        Self {
            chain: RwLock::new(chain),
            mempool: RwLock::new(mempool),
            params,
            coins,
            next_work: Box::new(NoRetarget),
        }
    }

    /// Replace the retargeting rule used for network difficulty
    pub fn with_next_work(mut self, next_work: Box<dyn NextWorkRequired + Send + Sync>) -> Self {
        self.next_work = next_work;
        self
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Consistent view over chain and mempool
    pub async fn session(&self) -> QuerySession<'_> {
        let chain = self.chain.read().await;
        let mempool = self.mempool.read().await;

        let height = chain.active.height();
        metrics::set_chain_tip_height(height);
        metrics::set_mempool_size(mempool.len());
        debug!(tip_height = height, mempool_size = mempool.len(), "Query session acquired");

        QuerySession {
            node: self,
            chain,
            mempool,
        }
    }

    /// Chain lock only, for callers that never touch the mempool
    pub async fn chain(&self) -> RwLockReadGuard<'_, ChainState> {
        self.chain.read().await
    }

    /// Engine-side write access to the chain state
    pub async fn chain_mut(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.chain.write().await
    }

    /// Engine-side write access to the mempool. Do not call while holding a
    /// chain guard taken after this one.
    pub async fn mempool_mut(&self) -> RwLockWriteGuard<'_, Mempool> {
        self.mempool.write().await
    }
}

pub struct QuerySession<'a> {
    node: &'a NodeState,
    chain: RwLockReadGuard<'a, ChainState>,
    mempool: RwLockReadGuard<'a, Mempool>,
}

impl<'a> QuerySession<'a> {
    pub fn chain_state(&self) -> &ChainState {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Run one query, recording latency and failures
    fn observe<T>(&self, query: &'static str, run: impl FnOnce() -> QueryResult<T>) -> QueryResult<T> {
        let timer = Timer::new();
        let result = run();
        metrics::record_query(query, timer.elapsed_secs());
        if let Err(e) = &result {
            metrics::increment_query_errors(e.kind());
            warn!(query, kind = e.kind(), error = %e, "Query failed");
        }
        result
    }

    /// Difficulty the next block must meet
    pub fn difficulty(&self) -> QueryResult<f64> {
        self.observe("difficulty", || {
            network_difficulty(&self.chain, None, &self.node.params, self.node.next_work.as_ref())
        })
    }

    /// Difficulty recorded in the block at `locator` (hash or height)
    pub fn block_difficulty(&self, locator: &str) -> QueryResult<f64> {
        let chain: &ChainState = &self.chain;
        self.observe("block_difficulty", || {
            let id = blocks::resolve_block(chain, locator)?;
            block_difficulty(chain, Some(id), &self.node.params)
        })
    }

    pub fn chain_tips(&self) -> QueryResult<Vec<ChainTip>> {
        self.observe("chain_tips", || chain_tips(&self.chain))
    }

    pub fn blockchain_info(&self) -> QueryResult<ChainSummary> {
        self.observe("blockchain_info", || {
            chain_summary(&self.chain, &self.node.params, self.node.next_work.as_ref())
        })
    }

    /// Blocks among the last `window` from the active tip with version >= `min_version`
    pub fn majority(&self, min_version: i32, window: usize, required: usize) -> QueryResult<MajorityStatus> {
        self.observe("majority", || {
            majority_status(&self.chain.tree, self.chain.active.tip(), min_version, window, required)
        })
    }

    pub fn block_count(&self) -> i64 {
        blocks::block_count(&self.chain)
    }

    pub fn best_block_hash(&self) -> QueryResult<Hash256> {
        self.observe("best_block_hash", || blocks::best_block_hash(&self.chain))
    }

    pub fn block_hash(&self, height: i64) -> QueryResult<Hash256> {
        self.observe("block_hash", || blocks::block_hash_at(&self.chain, height))
    }

    pub fn header(&self, locator: &str) -> QueryResult<BlockHeaderInfo> {
        let chain: &ChainState = &self.chain;
        self.observe("header", || {
            let id = blocks::resolve_block(chain, locator)?;
            blocks::header_info(chain, id, &self.node.params)
        })
    }

    pub fn mempool_info(&self) -> MempoolInfo {
        self.mempool.info()
    }

    pub fn raw_mempool(&self) -> Vec<TxId> {
        self.mempool.txids()
    }

    /// Verbose mempool listing, priorities aged to the active tip height
    pub fn mempool_verbose(&self) -> Vec<MempoolEntryInfo> {
        let height = self.chain.active.height().max(0) as u32;
        self.mempool.verbose_entries(height)
    }

    /// Direct in-pool parents of a pooled transaction
    pub fn dependencies(&self, txid: &TxId) -> QueryResult<Vec<TxId>> {
        self.observe("dependencies", || {
            let entry = self.mempool.get(txid).ok_or_else(|| {
                QueryError::NotFound(format!("transaction {} not in mempool", txid))
            })?;
            Ok(self.mempool.dependencies(entry).into_iter().collect())
        })
    }

    pub fn tx_out(&self, txid: &TxId, n: u32, include_mempool: bool) -> QueryResult<Option<TxOutInfo>> {
        let pool = if include_mempool { Some(&*self.mempool) } else { None };
        debug!(txid = %truncate_hex(&txid.to_hex(), 16), n, include_mempool, "Unspent output lookup");
        self.observe("tx_out", || {
            utxo::tx_out(&self.chain, self.node.coins.as_ref(), pool, txid, n)
        })
    }

    pub fn tx_out_set_info(&self) -> Option<CoinsStats> {
        utxo::tx_out_set_info(self.node.coins.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_index::test_util::*;
    use crate::block_index::{BlockIndexNode, BlockStatus, ValidityLevel};
    use crate::chain::ActiveChain;
    use crate::forks::TipStatus;
    use crate::mempool::test_util::{entry, txid};
    use crate::utxo::MemoryCoinsView;
    use std::sync::Arc;

    fn node_state() -> NodeState {
        let (mut tree, ids) = linear_tree(&[1, 2, 3, 4]);
        tree.insert(header(50, Some(tree.node(ids[1]).hash), 4), BlockStatus::with_data(ValidityLevel::Scripts))
            .unwrap();
        let active = ActiveChain::from_tip(&tree, ids[3]).unwrap();
        let best = tree.node(ids[3]).hash;

        let mut pool = Mempool::new();
        pool.insert(entry(1, &[(200, 0)]));
        pool.insert(entry(2, &[(1, 0), (1, 1)]));

        let coins = MemoryCoinsView { best_block: best, ..Default::default() };
        let mut params = ChainParams::regtest();
        params.pow_limit_bits = REGTEST_BITS;
        NodeState::new(ChainState::new(tree, active), pool, params, Box::new(coins))
    }

    #[tokio::test]
    async fn test_session_queries() {
        let node = node_state();
        let session = node.session().await;

        assert_eq!(session.block_count(), 3);
        assert_eq!(session.difficulty().unwrap(), 1.0);
        assert_eq!(session.block_difficulty("1").unwrap(), 1.0);

        let tips = session.chain_tips().unwrap();
        assert_eq!(tips.len(), 2);
        assert_eq!(tips[0].status, Some(TipStatus::Active));
        assert_eq!(tips[1].status, Some(TipStatus::ValidFork));

        assert_eq!(session.dependencies(&txid(2)).unwrap(), vec![txid(1)]);
        assert!(session.dependencies(&txid(1)).unwrap().is_empty());
        assert_eq!(session.mempool_info().size, 2);
        assert_eq!(session.raw_mempool(), vec![txid(1), txid(2)]);

        let unconfirmed = session.tx_out(&txid(2), 0, true).unwrap().unwrap();
        assert_eq!(unconfirmed.confirmations, 0);
        assert_eq!(session.tx_out(&txid(1), 0, true).unwrap(), None);
    }

    #[tokio::test]
    async fn test_errors_are_returned() {
        let node = node_state();
        let session = node.session().await;
        assert!(matches!(session.dependencies(&txid(99)), Err(QueryError::NotFound(_))));
        assert!(matches!(session.block_hash(10), Err(QueryError::OutOfRange { height: 10, tip: 3 })));
        assert!(matches!(
            session.majority(4, 1_000_000, 1),
            Err(QueryError::InputTooLarge { .. })
        ));
        assert!(matches!(session.header("abc"), Err(QueryError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_difficulty_reports_broken_chain() {
        let (long_tree, ids) = linear_tree(&[1, 1, 1, 1]);
        let active = ActiveChain::from_tip(&long_tree, ids[3]).unwrap();
        let (short_tree, _) = linear_tree(&[1]);
        let coins = MemoryCoinsView::default();
        let node = NodeState::new(
            ChainState::new(short_tree, active),
            Mempool::new(),
            ChainParams::regtest(),
            Box::new(coins),
        );
        let session = node.session().await;

        assert!(matches!(session.difficulty(), Err(QueryError::Inconsistent(_))));
        assert!(matches!(session.blockchain_info(), Err(QueryError::Inconsistent(_))));
        assert!(matches!(session.block_hash(3), Err(QueryError::Inconsistent(_))));
    }

    #[tokio::test]
    async fn test_query_metrics_recorded() {
        let node = node_state();
        let session = node.session().await;
        let before = metrics::QUERIES_TOTAL.with_label_values(&["chain_tips"]).get();
        let errors_before = metrics::QUERY_ERRORS.with_label_values(&["out_of_range"]).get();

        session.chain_tips().unwrap();
        let _ = session.block_hash(-5);

        assert!(metrics::QUERIES_TOTAL.with_label_values(&["chain_tips"]).get() > before);
        assert!(metrics::QUERY_ERRORS.with_label_values(&["out_of_range"]).get() > errors_before);
    }

    #[tokio::test]
    async fn test_writer_waits_for_session() {
        let node = Arc::new(node_state());
        let session = node.session().await;
        let old_tip = session.best_block_hash().unwrap();

        let writer = {
            let node = Arc::clone(&node);
            tokio::spawn(async move {
                let mut chain = node.chain_mut().await;
                let side = chain.tree.lookup(&hash_of(50)).unwrap();
                chain.set_tip(side).unwrap();
            })
        };

        // The writer cannot proceed while the session holds the chain lock
        tokio::task::yield_now().await;
        assert_eq!(session.best_block_hash().unwrap(), old_tip);
        assert_eq!(session.block_count(), 3);
        drop(session);

        writer.await.unwrap();
        let session = node.session().await;
        assert_eq!(session.best_block_hash().unwrap(), hash_of(50));
        assert_eq!(session.block_count(), 2);
    }

    #[tokio::test]
    async fn test_engine_updates_visible_to_new_sessions() {
        struct Harder;
        impl NextWorkRequired for Harder {
            fn next_work_required(&self, _tip: &BlockIndexNode, _state: &ChainState, _params: &ChainParams) -> u32 {
                0x1f7fffff
            }
        }

        let node = node_state().with_next_work(Box::new(Harder));
        assert_eq!(node.session().await.difficulty().unwrap(), 256.0);

        node.mempool_mut().await.insert(entry(3, &[(2, 0)]));
        let session = node.session().await;
        assert_eq!(session.mempool_info().size, 3);
        assert_eq!(session.dependencies(&txid(3)).unwrap(), vec![txid(2)]);
        assert_eq!(session.mempool_verbose()[2].depends, vec![txid(2)]);
    }

    #[tokio::test]
    async fn test_concurrent_readers() {
        let node = node_state();
        let a = node.session().await;
        let b = node.session().await;
        assert_eq!(a.chain_tips().unwrap(), b.chain_tips().unwrap());

        let chain = node.chain().await;
        assert_eq!(chain.active.height(), 3);
    }
}
