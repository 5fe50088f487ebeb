use thiserror::Error;

/// Failure modes of a move request. The host converts every one of these into
/// a `SearchResult`; only `SearchResult::require_move` hands them back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("no legal moves in position (terminal)")]
    NoLegalMoves,
    #[error("request {0} was cancelled")]
    Cancelled(u64),
    #[error("search exceeded its time budget of {0} ms")]
    Timeout(u64),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self { EngineError::Config(e.to_string()) }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self { EngineError::Config(e.to_string()) }
}
