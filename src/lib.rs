// Difficulty-scaled move search with tactical blunder safety
pub mod board;
pub mod book;
pub mod config;
pub mod error;
pub mod host;
pub mod search;
pub mod uci;

pub use config::EngineConfig;
pub use error::EngineError;
pub use host::{Engine, RequestId, SearchHandle};
pub use search::{SearchRequest, SearchResult, SearchSource};
