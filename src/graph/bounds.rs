use super::{ChannelId, GraphView};
use crate::rational::{gcd, Rational};
use crate::sim::Simulator;

/// Derived, once-computed bounds for a graph: the minimal step by which each
/// channel's capacity may grow, the minimal per-channel size admitting
/// positive throughput in isolation, their sum, and the unconstrained
/// maximum throughput.
#[derive(Debug, Clone)]
pub struct Bounds {
    pub min_step: Vec<u64>,
    pub min_sz: Vec<u64>,
    pub lb_distribution_sz: u64,
    pub max_throughput: Rational,
}

impl Bounds {
    pub fn compute(g: &impl GraphView) -> Self {
        let min_step: Vec<u64> = g.channels().map(|c| channel_min_step(g, c)).collect();
        let min_sz: Vec<u64> = g.channels().map(|c| channel_min_sz(g, c)).collect();
        let lb_distribution_sz = min_sz.iter().sum();
        let max_throughput = Simulator::new(g).max_throughput();
        Bounds {
            min_step,
            min_sz,
            lb_distribution_sz,
            max_throughput,
        }
    }
}

fn channel_min_step(g: &impl GraphView, c: ChannelId) -> u64 {
    let mut step = 0u64;
    for phase in 0..g.src_seq_len(c) {
        step = gcd(step, g.rate_src(c, phase));
    }
    for phase in 0..g.dst_seq_len(c) {
        step = gcd(step, g.rate_dst(c, phase));
    }
    step.max(1)
}

/// Lower bound on channel `c`'s storage that permits positive throughput in
/// isolation, per-phase over the gcd of the two rate sequences' lengths.
fn channel_min_sz(g: &impl GraphView, c: ChannelId) -> u64 {
    let period = gcd(g.src_seq_len(c) as u64, g.dst_seq_len(c) as u64) as usize;
    let t = g.initial_tokens(c);
    let is_self_edge = g.src_actor(c) == g.dst_actor(c);

    (0..period)
        .map(|i| {
            let p = g.rate_src(c, i);
            let k = g.rate_dst(c, i);
            if is_self_edge {
                p + k.max(t)
            } else {
                let d = gcd(p, k);
                let lb = if d != 0 { p + k - d + t % d } else { p + k };
                lb.max(t)
            }
        })
        .min()
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    /// Scenario 1 from the testable-properties section: two-actor HSDF
    /// cycle, exec(A)=1, exec(B)=2, c1: A->B rate 1/1 t0=0, c2: B->A rate
    /// 1/1 t0=1.
    #[test]
    fn two_actor_hsdf_cycle_bounds() {
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1], 1);
        let bb = b.add_actor(vec![2], 1);
        b.add_channel(a, vec![1], bb, vec![1], 0);
        b.add_channel(bb, vec![1], a, vec![1], 1);
        let g = b.build().unwrap();

        let bounds = Bounds::compute(&g);
        assert_eq!(bounds.min_step, vec![1, 1]);
        assert_eq!(bounds.min_sz, vec![1, 1]);
        assert_eq!(bounds.lb_distribution_sz, 2);
        assert_eq!(bounds.max_throughput, Rational::new(1, 3));
    }

    /// Actor A has L=2 with output rates (2,1), B has L=1 input rate 1,
    /// t0=0. Iterating gcd(2,1)=1 phase, lb = p+k-gcd(p,k)+t%gcd(p,k) =
    /// 2+1-1+0 = 2.
    #[test]
    fn two_phase_producer_min_sz() {
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1, 1], 1);
        let bb = b.add_actor(vec![3], 2);
        b.add_channel(a, vec![2, 1], bb, vec![1], 0);
        let g = b.build().unwrap();
        let bounds = Bounds::compute(&g);
        assert_eq!(bounds.min_sz[0], 2);
    }

    /// Scenario 4: a pure self-edge, t0=1, rates 1/1 -> min_sz = 1 + max(1,1) = 2.
    #[test]
    fn self_edge_min_sz() {
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1], 1);
        b.add_channel(a, vec![1], a, vec![1], 1);
        let g = b.build().unwrap();
        let bounds = Bounds::compute(&g);
        assert_eq!(bounds.min_sz[0], 2);
    }
}
