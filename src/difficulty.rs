//! Difficulty
//!
//! Difficulty is the ratio between the proof-of-work limit and a block's
//! target, so the easiest allowed target is exactly 1.0.

use crate::block_index::{BlockIndexNode, NodeId};
use crate::chain_state::ChainState;
use crate::config::ChainParams;
use crate::error::QueryResult;

/// Compact target the engine would require for the block after `tip`.
///
/// Retargeting rules live in the consensus engine; queries only ask.
pub trait NextWorkRequired {
    fn next_work_required(&self, tip: &BlockIndexNode, state: &ChainState, params: &ChainParams) -> u32;
}

/// Keeps the tip's target forever (the regtest rule)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetarget;

impl NextWorkRequired for NoRetarget {
    fn next_work_required(&self, tip: &BlockIndexNode, _state: &ChainState, _params: &ChainParams) -> u32 {
        tip.bits
    }
}

/// Difficulty of `target_bits` relative to `limit_bits`.
///
/// The shift difference is applied one byte at a time; folding it into a
/// single power of 256 rounds differently from the figures nodes have always
/// reported.
pub fn difficulty_from_bits(target_bits: u32, limit_bits: u32) -> f64 {
    let mut shift = (target_bits >> 24) & 0xff;
    let limit_shift = (limit_bits >> 24) & 0xff;

    let mut diff = (limit_bits & 0x00ffffff) as f64 / (target_bits & 0x00ffffff) as f64;

    while shift < limit_shift {
        diff *= 256.0;
        shift += 1;
    }
    while shift > limit_shift {
        diff /= 256.0;
        shift -= 1;
    }
    diff
}

/// Node a difficulty query refers to. `None` asks for the active tip; with no
/// active chain at all there is nothing to resolve.
fn resolve<'a>(state: &'a ChainState, node: Option<NodeId>) -> QueryResult<Option<&'a BlockIndexNode>> {
    match node {
        Some(id) => Ok(Some(state.tree.get(id)?)),
        None if state.active.tip().is_none() => Ok(None),
        None => Ok(Some(state.tip()?.1)),
    }
}

/// Difficulty recorded in a block (`None` = active tip, 1.0 without one)
pub fn block_difficulty(state: &ChainState, node: Option<NodeId>, params: &ChainParams) -> QueryResult<f64> {
    Ok(match resolve(state, node)? {
        Some(n) => difficulty_from_bits(n.bits, params.pow_limit_bits),
        None => 1.0,
    })
}

/// Difficulty the next block on top of `node` must meet (`None` = active tip)
pub fn network_difficulty(
    state: &ChainState,
    node: Option<NodeId>,
    params: &ChainParams,
    next_work: &dyn NextWorkRequired,
) -> QueryResult<f64> {
    Ok(match resolve(state, node)? {
        Some(n) => {
            let bits = next_work.next_work_required(n, state, params);
            difficulty_from_bits(bits, params.pow_limit_bits)
        }
        None => 1.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_index::test_util::*;
    use crate::chain::ActiveChain;
    use crate::error::QueryError;

    struct FixedBits(u32);

    impl NextWorkRequired for FixedBits {
        fn next_work_required(&self, _tip: &BlockIndexNode, _state: &ChainState, _params: &ChainParams) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_limit_is_difficulty_one() {
        for bits in [0x1d00ffffu32, 0x1f07ffff, 0x200f0f0f, 0x207fffff] {
            assert_eq!(difficulty_from_bits(bits, bits), 1.0);
        }
    }

    #[test]
    fn test_bitcoin_reference_values() {
        let limit = 0x1d00ffff;
        let d = difficulty_from_bits(0x1b0404cb, limit);
        assert!((d - 16307.420938523983).abs() < 1e-6, "got {}", d);
        // Target above the limit: easier than minimum
        assert_eq!(difficulty_from_bits(0x1e00ffff, limit), 1.0 / 256.0);
    }

    #[test]
    fn test_monotone_in_mantissa() {
        let limit = 0x1d00ffff;
        let mut last = f64::INFINITY;
        for mantissa in [0x000100u32, 0x001000, 0x00ffff, 0x0fffff, 0x7fffff] {
            let d = difficulty_from_bits(0x1c000000 | mantissa, limit);
            assert!(d < last, "difficulty must fall as the mantissa grows");
            last = d;
        }
    }

    #[test]
    fn test_no_chain_is_difficulty_one() {
        let state = ChainState::default();
        let params = ChainParams::regtest();
        assert_eq!(block_difficulty(&state, None, &params).unwrap(), 1.0);
        assert_eq!(network_difficulty(&state, None, &params, &NoRetarget).unwrap(), 1.0);
    }

    #[test]
    fn test_block_and_network_variants() {
        let (tree, ids) = linear_tree(&[1, 1]);
        let active = ActiveChain::from_tip(&tree, ids[1]).unwrap();
        let state = ChainState::new(tree, active);
        let mut params = ChainParams::regtest();
        params.pow_limit_bits = REGTEST_BITS;

        assert_eq!(block_difficulty(&state, None, &params).unwrap(), 1.0);
        assert_eq!(block_difficulty(&state, Some(ids[0]), &params).unwrap(), 1.0);
        assert_eq!(network_difficulty(&state, None, &params, &NoRetarget).unwrap(), 1.0);
        assert_eq!(network_difficulty(&state, None, &params, &FixedBits(0x1f7fffff)).unwrap(), 256.0);
    }

    #[test]
    fn test_unknown_node_is_not_found() {
        let (tree, ids) = linear_tree(&[1, 1]);
        let active = ActiveChain::from_tip(&tree, ids[1]).unwrap();
        let state = ChainState::new(tree, active);
        let params = ChainParams::regtest();

        assert!(matches!(
            block_difficulty(&state, Some(NodeId(999)), &params),
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            network_difficulty(&state, Some(NodeId(999)), &params, &NoRetarget),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_active_chain_outside_tree_is_inconsistent() {
        // Four-block active chain over a one-node tree
        let (long_tree, ids) = linear_tree(&[1, 1, 1, 1]);
        let active = ActiveChain::from_tip(&long_tree, ids[3]).unwrap();
        let (short_tree, _) = linear_tree(&[1]);
        let state = ChainState::new(short_tree, active);
        let params = ChainParams::regtest();

        assert!(matches!(block_difficulty(&state, None, &params), Err(QueryError::Inconsistent(_))));
        assert!(matches!(
            network_difficulty(&state, None, &params, &NoRetarget),
            Err(QueryError::Inconsistent(_))
        ));
    }
}
