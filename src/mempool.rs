//! Mempool Snapshot
//!
//! Unconfirmed transactions as the pool holds them:
//! - Per-entry size, fee, arrival time and entry height
//! - Inputs (for in-pool dependency projection)
//! - Outputs (for the unspent-output overlay)
//! - Priority inputs for the starting/current priority figures

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{amount_to_coins, Amount, OutPoint, TxId, TxOut};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MempoolEntry {
    pub txid: TxId,
    /// Transaction version
    #[serde(default = "default_tx_version")]
    pub version: i32,
    /// Serialized size in bytes
    pub size: usize,
    pub fee: Amount,
    /// Arrival time, seconds since the epoch
    pub time: u64,
    /// Active-chain height when the transaction entered the pool
    pub height: u32,
    pub inputs: Vec<OutPoint>,
    #[serde(default)]
    pub outputs: Vec<TxOut>,
    #[serde(default)]
    pub starting_priority: f64,
    /// Value of inputs already confirmed when the entry was added
    #[serde(default)]
    pub in_chain_input_value: Amount,
}

fn default_tx_version() -> i32 {
    1
}

impl MempoolEntry {
    /// Priority once the chain reaches `current_height`: confirmed inputs keep
    /// aging while the transaction waits.
    pub fn priority_at(&self, current_height: u32) -> f64 {
        if current_height <= self.height || self.size == 0 {
            return self.starting_priority;
        }
        let delta = (current_height - self.height) as f64 * self.in_chain_input_value as f64;
        self.starting_priority + delta / self.size as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MempoolInfo {
    pub size: usize,
    pub bytes: usize,
    pub usage: usize,
}

/// Verbose per-transaction view of a pooled entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MempoolEntryInfo {
    pub txid: TxId,
    pub size: usize,
    /// Fee in coins
    pub fee: f64,
    pub time: u64,
    pub height: u32,
    #[serde(rename = "startingpriority")]
    pub starting_priority: f64,
    #[serde(rename = "currentpriority")]
    pub current_priority: f64,
    /// Pooled transactions this one spends from
    pub depends: Vec<TxId>,
}

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    entries: BTreeMap<TxId, MempoolEntry>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine-side insert; replaces an entry with the same txid
    pub fn insert(&mut self, entry: MempoolEntry) {
        self.entries.insert(entry.txid, entry);
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn get(&self, txid: &TxId) -> Option<&MempoolEntry> {
        self.entries.get(txid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MempoolEntry> {
        self.entries.values()
    }

    /// All pooled txids, sorted
    pub fn txids(&self) -> Vec<TxId> {
        self.entries.keys().copied().collect()
    }

    /// Direct in-pool parents of `entry`.
    ///
    /// One hop only; several inputs spending the same parent collapse to one id.
    pub fn dependencies(&self, entry: &MempoolEntry) -> BTreeSet<TxId> {
        entry
            .inputs
            .iter()
            .map(|input| input.txid)
            .filter(|prev| *prev != entry.txid && self.contains(prev))
            .collect()
    }

    /// True if some pooled transaction spends `outpoint`
    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.entries
            .values()
            .any(|entry| entry.inputs.iter().any(|input| input == outpoint))
    }

    pub fn total_size(&self) -> usize {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Estimated heap footprint of the pool
    pub fn usage(&self) -> usize {
        self.entries
            .values()
            .map(|e| {
                std::mem::size_of::<MempoolEntry>()
                    + std::mem::size_of::<TxId>()
                    + e.inputs.capacity() * std::mem::size_of::<OutPoint>()
                    + e.outputs.capacity() * std::mem::size_of::<TxOut>()
                    + e.outputs.iter().map(|o| o.script_pubkey.capacity()).sum::<usize>()
            })
            .sum()
    }

    pub fn info(&self) -> MempoolInfo {
        MempoolInfo {
            size: self.len(),
            bytes: self.total_size(),
            usage: self.usage(),
        }
    }

    /// Verbose listing; `chain_height` is the active tip height used for the
    /// current priority.
    pub fn verbose_entries(&self, chain_height: u32) -> Vec<MempoolEntryInfo> {
        self.entries
            .values()
            .map(|e| MempoolEntryInfo {
                txid: e.txid,
                size: e.size,
                fee: amount_to_coins(e.fee),
                time: e.time,
                height: e.height,
                starting_priority: e.priority_at(e.height),
                current_priority: e.priority_at(chain_height),
                depends: self.dependencies(e).into_iter().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::types::Hash256;

    pub fn txid(tag: u8) -> TxId {
        let mut bytes = [0u8; 32];
        bytes[0] = tag;
        bytes[31] = 0x7e;
        Hash256(bytes)
    }

    pub fn entry(tag: u8, inputs: &[(u8, u32)]) -> MempoolEntry {
        MempoolEntry {
            txid: txid(tag),
            version: 1,
            size: 250,
            fee: 10_000,
            time: 1_600_000_000 + tag as u64,
            height: 100,
            inputs: inputs
                .iter()
                .map(|(t, n)| OutPoint { txid: txid(*t), n: *n })
                .collect(),
            outputs: vec![
                TxOut { value: 50_000, script_pubkey: "76a914".to_string() },
                TxOut { value: 25_000, script_pubkey: "a914".to_string() },
            ],
            starting_priority: 0.0,
            in_chain_input_value: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    fn pool(entries: Vec<MempoolEntry>) -> Mempool {
        let mut pool = Mempool::new();
        for e in entries {
            pool.insert(e);
        }
        pool
    }

    #[test]
    fn test_two_inputs_same_parent_single_dependency() {
        let p = entry(1, &[(200, 0)]);
        let t = entry(2, &[(1, 0), (1, 1)]);
        let pool = pool(vec![p, t.clone()]);
        let deps = pool.dependencies(&t);
        assert_eq!(deps.len(), 1);
        assert!(deps.contains(&txid(1)));
    }

    #[test]
    fn test_only_pooled_direct_parents() {
        // 3 spends 2 spends 1; 3 also spends confirmed 200
        let pool = pool(vec![
            entry(1, &[(200, 0)]),
            entry(2, &[(1, 0)]),
            entry(3, &[(2, 0), (200, 1)]),
        ]);
        let t3 = pool.get(&txid(3)).unwrap();
        let deps = pool.dependencies(t3);
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec![txid(2)]);

        for e in pool.iter() {
            let deps = pool.dependencies(e);
            assert!(!deps.contains(&e.txid));
            assert!(deps.iter().all(|d| pool.contains(d)));
        }
    }

    #[test]
    fn test_self_reference_excluded() {
        let odd = entry(9, &[(9, 0)]);
        let pool = pool(vec![odd.clone()]);
        assert!(pool.dependencies(&odd).is_empty());
    }

    #[test]
    fn test_info_and_spent() {
        let pool = pool(vec![entry(1, &[(200, 0)]), entry(2, &[(1, 1)])]);
        let info = pool.info();
        assert_eq!(info.size, 2);
        assert_eq!(info.bytes, 500);
        assert!(info.usage > info.size * std::mem::size_of::<MempoolEntry>());
        assert!(pool.is_spent(&OutPoint { txid: txid(1), n: 1 }));
        assert!(!pool.is_spent(&OutPoint { txid: txid(1), n: 0 }));
        assert_eq!(pool.txids(), vec![txid(1), txid(2)]);
    }

    #[test]
    fn test_verbose_entries_priority_and_depends() {
        let mut child = entry(2, &[(1, 0)]);
        child.starting_priority = 1_000.0;
        child.in_chain_input_value = 500;
        let pool = pool(vec![entry(1, &[(200, 0)]), child]);

        let verbose = pool.verbose_entries(110);
        assert_eq!(verbose.len(), 2);
        assert!(verbose[0].depends.is_empty());
        assert_eq!(verbose[1].depends, vec![txid(1)]);
        assert_eq!(verbose[0].fee, 0.0001);
        assert_eq!(verbose[1].starting_priority, 1_000.0);
        // 1000 + 10 blocks * 500 / 250 bytes
        assert_eq!(verbose[1].current_priority, 1_020.0);

        // Chain behind the entry height: no aging
        assert_eq!(pool.verbose_entries(50)[1].current_priority, 1_000.0);
    }

    #[test]
    fn test_dependencies_idempotent() {
        let pool = pool(vec![entry(1, &[]), entry(2, &[(1, 0), (1, 1), (3, 0)]), entry(3, &[])]);
        let t = pool.get(&txid(2)).unwrap();
        assert_eq!(pool.dependencies(t), pool.dependencies(t));
        assert_eq!(pool.dependencies(t).len(), 2);
    }
}
