use super::{validate, ActorId, ChannelId, GraphView};
use crate::error::Result;

#[derive(Debug, Clone)]
struct Actor {
    exec: Vec<u64>,
}

#[derive(Debug, Clone)]
struct Port {
    rates: Vec<u64>,
}

#[derive(Debug, Clone)]
struct Channel {
    src: ActorId,
    dst: ActorId,
    src_port: Port,
    dst_port: Port,
    initial_tokens: u64,
}

/// An owned, dense-id Cyclo-Static Dataflow Graph.
///
/// This is the one concrete [`GraphView`] the crate ships: enough to build
/// and exercise graphs in tests and demos without an XML loader, which is an
/// external collaborator's responsibility.
#[derive(Debug, Clone)]
pub struct Graph {
    actors: Vec<Actor>,
    channels: Vec<Channel>,
    repetition: Vec<u64>,
}

impl GraphView for Graph {
    fn num_actors(&self) -> usize {
        self.actors.len()
    }

    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn src_actor(&self, c: ChannelId) -> ActorId {
        self.channels[c.0].src
    }

    fn dst_actor(&self, c: ChannelId) -> ActorId {
        self.channels[c.0].dst
    }

    fn rate_src(&self, c: ChannelId, phase: usize) -> u64 {
        let port = &self.channels[c.0].src_port;
        port.rates[phase % port.rates.len()]
    }

    fn rate_dst(&self, c: ChannelId, phase: usize) -> u64 {
        let port = &self.channels[c.0].dst_port;
        port.rates[phase % port.rates.len()]
    }

    fn src_seq_len(&self, c: ChannelId) -> usize {
        self.channels[c.0].src_port.rates.len()
    }

    fn dst_seq_len(&self, c: ChannelId) -> usize {
        self.channels[c.0].dst_port.rates.len()
    }

    fn exec(&self, a: ActorId, phase: usize) -> u64 {
        let actor = &self.actors[a.0];
        actor.exec[phase % actor.exec.len()]
    }

    fn seq_len(&self, a: ActorId) -> usize {
        self.actors[a.0].exec.len()
    }

    fn initial_tokens(&self, c: ChannelId) -> u64 {
        self.channels[c.0].initial_tokens
    }

    fn repetition(&self, a: ActorId) -> u64 {
        self.repetition[a.0]
    }
}

/// Builds a [`Graph`] one actor/channel at a time, validating consistency at
/// [`GraphBuilder::build`] time so downstream code can assume a well-formed
/// graph, per the engine's input contract.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    actors: Vec<Actor>,
    channels: Vec<Channel>,
    repetition: Vec<u64>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an actor with the given per-phase execution-time sequence and
    /// repetition count, returning its id.
    pub fn add_actor(&mut self, exec: Vec<u64>, repetition: u64) -> ActorId {
        assert!(!exec.is_empty(), "actor phase sequence must be non-empty");
        let id = ActorId(self.actors.len());
        self.actors.push(Actor { exec });
        self.repetition.push(repetition);
        id
    }

    /// Adds a channel from `src`'s output port (rate sequence `src_rates`)
    /// to `dst`'s input port (rate sequence `dst_rates`), with `initial_tokens`
    /// tokens preloaded. Self-edges (`src == dst`) are permitted.
    pub fn add_channel(
        &mut self,
        src: ActorId,
        src_rates: Vec<u64>,
        dst: ActorId,
        dst_rates: Vec<u64>,
        initial_tokens: u64,
    ) -> ChannelId {
        assert!(!src_rates.is_empty() && !dst_rates.is_empty());
        let id = ChannelId(self.channels.len());
        self.channels.push(Channel {
            src,
            dst,
            src_port: Port { rates: src_rates },
            dst_port: Port { rates: dst_rates },
            initial_tokens,
        });
        id
    }

    pub fn build(self) -> Result<Graph> {
        let graph = Graph {
            actors: self.actors,
            channels: self.channels,
            repetition: self.repetition,
        };
        validate(&graph)?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_actor_cycle_builds() {
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1], 3);
        let x = b.add_actor(vec![2], 1);
        b.add_channel(a, vec![1], x, vec![1], 0);
        b.add_channel(x, vec![1], a, vec![1], 1);
        let g = b.build().unwrap();
        assert_eq!(g.num_actors(), 2);
        assert_eq!(g.num_channels(), 2);
    }

    #[test]
    fn rejects_empty_graph() {
        let b = GraphBuilder::new();
        assert!(b.build().is_err());
    }

    #[test]
    fn rejects_zero_repetition() {
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1], 0);
        b.add_channel(a, vec![1], a, vec![1], 1);
        assert!(b.build().is_err());
    }

    #[test]
    fn output_actor_is_smallest_repetition_ties_to_lowest_id() {
        let mut b = GraphBuilder::new();
        let a0 = b.add_actor(vec![1], 2);
        let _a1 = b.add_actor(vec![1], 2);
        b.add_channel(a0, vec![1], a0, vec![1], 1);
        let g = b.build().unwrap();
        assert_eq!(g.select_output_actor(), a0);
    }
}
