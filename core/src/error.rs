use crate::DocId;
use thiserror::Error;

/// A document or term the index cannot answer for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("document not found: {0}")]
    DocumentNotFound(DocId),

    #[error("term not in vocabulary: {0}")]
    TermNotFound(String),

    #[error("term `{0}` reports a document frequency of zero")]
    ZeroDocumentFrequency(String),

    #[error("no positions for term `{term}` in document {doc_id}")]
    MissingPositions { doc_id: DocId, term: String },
}

/// Why a single (query, document) pair could not be scored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("score for document {0} is undefined (NaN)")]
    UndefinedScore(DocId),
}

/// Fatal setup problems, raised before any query is evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown scoring function `{0}` (expected one of: plnr, bm25, custom)")]
    UnknownScorer(String),

    #[error("invalid value {value} for parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("collection has no documents")]
    EmptyCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("evaluation cancelled")]
pub struct Cancelled;
