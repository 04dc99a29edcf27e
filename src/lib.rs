//! Throughput/buffer trade-off exploration for Cyclo-Static Dataflow Graphs.
//!
//! Given a CSDFG and a storage-capacity distribution over its channels, the
//! engine here self-timed-simulates the graph to find either its long-run
//! throughput or the reason it deadlocks, and [`pareto::Explorer`] searches
//! the space of distributions for the minimal ones that achieve each
//! throughput level up to the graph's unconstrained maximum.

pub mod error;
pub mod graph;
pub mod pareto;
pub mod rational;
pub mod sim;
pub mod state;

pub use error::{EngineError, Result};
pub use graph::{ActorId, Bounds, ChannelId, Graph, GraphBuilder, GraphView};
pub use pareto::{AnalyzeOutcome, Distribution, DistributionSet, Explorer, ParetoList};
pub use rational::Rational;
pub use sim::{SimResult, Simulator};
pub use state::{HashStateStore, LinearStateStore, State, StateRecurrenceStore};
