pub mod alphabeta;
pub mod clock;
pub mod difficulty;
pub mod eval;
pub mod gate;
pub mod noise;
pub mod pipeline;
pub mod see;
pub mod tactics;

pub use clock::{CancelToken, StopReason};
pub use difficulty::{DifficultyProfile, GateTier, ProfileTable, TacticalScanLevel};
pub use pipeline::{Pipeline, SearchRequest, SearchResult, SearchSource, Terminal};
