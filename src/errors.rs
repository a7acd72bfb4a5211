//! error type shared by all pipeline stages
//!

use thiserror::Error;

/// Errors raised by the search / alignment / prediction pipeline.
#[derive(Debug, Error)]
pub enum FriError {
    /// malformed sequence record or structure file
    #[error("format error: {0}")]
    Format(String),

    /// operation string consumes more residues than a sequence holds, or uses an unknown symbol
    #[error("alignment length error: {0}")]
    AlignmentLength(String),

    /// coordinate count differs from the number of template residues in the correspondence
    #[error("coordinate mismatch: {expected} template residues, {found} coordinates")]
    CoordinateMismatch { expected: usize, found: usize },

    /// template id absent from a structure source
    #[error("structure not found: {0}")]
    NotFound(String),

    /// requested chain absent from a template structure
    #[error("chain {chain} not found in {entry}")]
    Chain { entry: String, chain: String },

    /// bad or missing configuration, reported before any work starts
    #[error("configuration error: {0}")]
    Config(String),

    /// the search capability failed for a database stage
    #[error("search against {database} failed: {msg}")]
    Search { database: String, msg: String },

    /// a prediction capability failed
    #[error("prediction error: {0}")]
    Prediction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
} // end of FriError


impl FriError {
    /// true for failures that only concern one query and demote it to the sequence-only path.
    pub fn is_per_query(&self) -> bool {
        matches!(
            self,
            FriError::Format(_)
                | FriError::AlignmentLength(_)
                | FriError::CoordinateMismatch { .. }
                | FriError::NotFound(_)
                | FriError::Chain { .. }
        )
    }
} // end of impl FriError


pub type Result<T> = std::result::Result<T, FriError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_query_classification() {
        assert!(FriError::NotFound("1abc".into()).is_per_query());
        assert!(FriError::Chain { entry: "1abc".into(), chain: "B".into() }.is_per_query());
        assert!(FriError::CoordinateMismatch { expected: 3, found: 2 }.is_per_query());
        assert!(!FriError::Config("no modes".into()).is_per_query());
        assert!(!FriError::Search { database: "pdb100".into(), msg: "exit 1".into() }.is_per_query());
    }

    #[test]
    fn chain_message() {
        let err = FriError::Chain { entry: "1abc".into(), chain: "B".into() };
        assert_eq!(err.to_string(), "chain B not found in 1abc");
    }
}
