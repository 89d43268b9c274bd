//! Query Errors
//!
//! Every failure a read-only query can produce. Callers translate these into
//! protocol-level responses; nothing in the query layer logs or swallows them.

/// Error type for chain, mempool and UTXO queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Hash, txid or height has no corresponding node or entry
    NotFound(String),
    /// Height outside `[0, tip]`
    OutOfRange { height: i64, tip: i64 },
    /// The snapshot breaks an invariant the queries rely on
    Inconsistent(String),
    /// Caller asked for more than the fixed cap allows
    InputTooLarge { requested: usize, cap: usize },
    /// Argument could not be parsed
    InvalidParameter(String),
}

impl QueryError {
    /// Short stable label, used as a metrics label value
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::NotFound(_) => "not_found",
            QueryError::OutOfRange { .. } => "out_of_range",
            QueryError::Inconsistent(_) => "inconsistent",
            QueryError::InputTooLarge { .. } => "input_too_large",
            QueryError::InvalidParameter(_) => "invalid_parameter",
        }
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            QueryError::NotFound(s) => write!(f, "Not found: {}", s),
            QueryError::OutOfRange { height, tip } => {
                write!(f, "Block height {} out of range (tip is {})", height, tip)
            }
            QueryError::Inconsistent(s) => write!(f, "Inconsistent chain state: {}", s),
            QueryError::InputTooLarge { requested, cap } => {
                write!(f, "Requested {} exceeds the limit of {}", requested, cap)
            }
            QueryError::InvalidParameter(s) => write!(f, "Invalid parameter: {}", s),
        }
    }
}

impl std::error::Error for QueryError {}

pub type QueryResult<T> = Result<T, QueryError>;
