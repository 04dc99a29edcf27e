use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// `Deadlock` and insufficient-initial-space outcomes are *not* represented
/// here: they are expected simulator results (zero throughput, a populated
/// dependency vector), not faults. See [`crate::sim::SimResult`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("resource exhausted while {0}")]
    ResourceExhausted(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
