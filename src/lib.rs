//! Read-only queries over a node's block index, active chain, mempool and
//! UTXO set: difficulty, chain tips, soft-fork majorities, mempool
//! dependencies and unspent-output lookups.

pub mod block_index;
pub mod blocks;
pub mod chain;
pub mod chain_info;
pub mod chain_state;
pub mod chainwork;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod forks;
pub mod mempool;
pub mod metrics;
pub mod session;
pub mod snapshot;
pub mod softfork;
pub mod telemetry;
pub mod types;
pub mod utxo;

pub use block_index::{BlockHeader, BlockIndexNode, BlockStatus, BlockTree, NodeId, ValidityLevel};
pub use chain::ActiveChain;
pub use chain_state::ChainState;
pub use config::{ChainParams, Network};
pub use difficulty::{difficulty_from_bits, NextWorkRequired, NoRetarget};
pub use error::{QueryError, QueryResult};
pub use forks::{chain_tips, ChainTip, TipStatus};
pub use mempool::{Mempool, MempoolEntry};
pub use session::{NodeState, QuerySession};
pub use snapshot::SnapshotFile;
pub use types::{Hash256, OutPoint, TxId, TxOut};
pub use utxo::{CoinsView, MemoryCoinsView};
