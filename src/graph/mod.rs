pub mod bounds;
pub mod owned;

pub use bounds::Bounds;
pub use owned::{Graph, GraphBuilder};

use crate::error::{EngineError, Result};

/// Dense, zero-based actor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub usize);

/// Dense, zero-based channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub usize);

/// Read-only projection of a Cyclo-Static Dataflow Graph.
///
/// Implementors are trusted to be consistent: a positive-integer repetition
/// vector exists and is supplied verbatim by [`GraphView::repetition`]. The
/// engine never recomputes it.
pub trait GraphView {
    fn num_actors(&self) -> usize;
    fn num_channels(&self) -> usize;

    fn actors(&self) -> std::iter::Map<std::ops::Range<usize>, fn(usize) -> ActorId> {
        (0..self.num_actors()).map(ActorId)
    }
    fn channels(&self) -> std::iter::Map<std::ops::Range<usize>, fn(usize) -> ChannelId> {
        (0..self.num_channels()).map(ChannelId)
    }

    fn src_actor(&self, c: ChannelId) -> ActorId;
    fn dst_actor(&self, c: ChannelId) -> ActorId;

    /// Production rate of channel `c`'s source port at the given phase,
    /// already reduced modulo that port's phase length.
    fn rate_src(&self, c: ChannelId, phase: usize) -> u64;
    /// Consumption rate of channel `c`'s destination port at the given
    /// phase, already reduced modulo that port's phase length.
    fn rate_dst(&self, c: ChannelId, phase: usize) -> u64;

    fn src_seq_len(&self, c: ChannelId) -> usize;
    fn dst_seq_len(&self, c: ChannelId) -> usize;

    fn exec(&self, a: ActorId, phase: usize) -> u64;
    fn seq_len(&self, a: ActorId) -> usize;

    fn initial_tokens(&self, c: ChannelId) -> u64;

    /// Caller-supplied repetition count; must be strictly positive.
    fn repetition(&self, a: ActorId) -> u64;

    /// The actor with the smallest repetition count, ties broken by the
    /// lowest actor id. Its repetition count is the number of output
    /// completions that make up one periodic iteration.
    fn select_output_actor(&self) -> ActorId {
        (0..self.num_actors())
            .map(ActorId)
            .min_by_key(|&a| self.repetition(a))
            .expect("graph construction guarantees at least one actor")
    }
}

pub(crate) fn validate(g: &impl GraphView) -> Result<()> {
    if g.num_actors() == 0 {
        return Err(EngineError::InvalidGraph("graph has no actors".into()));
    }
    if g.num_channels() == 0 {
        return Err(EngineError::InvalidGraph("graph has no channels".into()));
    }
    for a in g.actors() {
        if g.seq_len(a) == 0 {
            return Err(EngineError::InvalidGraph(format!(
                "actor {} has zero-length phase sequence",
                a.0
            )));
        }
        if g.repetition(a) == 0 {
            return Err(EngineError::InvalidGraph(format!(
                "actor {} has a zero entry in the repetition vector",
                a.0
            )));
        }
    }
    for c in g.channels() {
        let src = g.src_actor(c);
        let dst = g.dst_actor(c);
        if src.0 >= g.num_actors() || dst.0 >= g.num_actors() {
            return Err(EngineError::InvalidGraph(format!(
                "channel {} references a missing actor",
                c.0
            )));
        }
    }
    Ok(())
}
