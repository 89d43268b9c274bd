use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Satoshis per coin
pub const COIN: i64 = 100_000_000;

/// Amount in satoshis
pub type Amount = i64;

/// Convert satoshis to a coin value for display
pub fn amount_to_coins(amount: Amount) -> f64 {
    amount as f64 / COIN as f64
}

/// 256-bit hash stored in internal (little-endian) byte order.
///
/// Displayed and parsed byte-reversed, the way node RPCs print block hashes
/// and txids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

/// Transaction ids share the block hash representation
pub type TxId = Hash256;

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn from_hex(s: &str) -> Result<Self, QueryError> {
        if s.len() != 64 {
            return Err(QueryError::InvalidParameter(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = hex::decode(s)
            .map_err(|e| QueryError::InvalidParameter(format!("bad hash '{}': {}", s, e)))?;
        bytes.reverse();
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Hash256(out))
    }

    pub fn to_hex(&self) -> String {
        format!("{:x}", self)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::LowerHex for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({:x})", self)
    }
}

impl FromStr for Hash256 {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash256::from_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(Error::custom)
    }
}

/// Reference to a previous transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub n: u32,
}

/// Transaction output: value plus locking script (hex encoded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: String,
}
