use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Serialize, Serializer};
use std::fmt;

/// Expand a compact target (nBits) into the full 256-bit target.
///
/// Returns `None` for targets the consensus code treats as invalid: zero,
/// negative (sign bit set with a non-zero mantissa) or wider than 256 bits.
pub fn expand_compact(n_bits: u32) -> Option<BigUint> {
    let exponent = n_bits >> 24;
    let mantissa = n_bits & 0x007fffff;

    if mantissa != 0 && (n_bits & 0x00800000) != 0 {
        return None;
    }

    let target = if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigUint::from(mantissa) << (8 * (exponent - 3))
    };

    if target.is_zero() || target.bits() > 256 {
        return None;
    }
    Some(target)
}

/// Accumulated proof-of-work as a 256-bit big-endian value
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ChainWork(pub [u8; 32]);

impl ChainWork {
    pub const ZERO: ChainWork = ChainWork([0u8; 32]);

    fn from_biguint(value: &BigUint) -> Self {
        let bytes = value.to_bytes_be();
        let mut result = [0u8; 32];
        // Sums past 2^256 keep the low 256 bits
        let take = bytes.len().min(32);
        result[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
        ChainWork(result)
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// `self + other`
    pub fn add(&self, other: &ChainWork) -> ChainWork {
        let sum = self.to_biguint() + other.to_biguint();
        ChainWork::from_biguint(&sum)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ChainWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainWork({})", self.to_hex())
    }
}

impl Serialize for ChainWork {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Work represented by a single block with the given compact target.
///
/// Work = 2^256 / (target + 1); invalid targets contribute nothing.
pub fn block_proof(n_bits: u32) -> ChainWork {
    let target = match expand_compact(n_bits) {
        Some(t) => t,
        None => return ChainWork::ZERO,
    };

    let numerator = BigUint::one() << 256;
    let denominator = target + BigUint::one();
    let work: BigUint = numerator / denominator;

    ChainWork::from_biguint(&work)
}
