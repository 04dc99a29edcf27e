use crate::error::EngineError;
use crate::graph::{Bounds, GraphView};
use crate::rational::Rational;
use crate::sim::Simulator;
use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A single storage-capacity assignment: one slot per channel, its total
/// size, the throughput it achieves, and which channels its bottleneck
/// implicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub cap: Vec<u64>,
    pub sz: u64,
    pub thr: Rational,
    pub dep: Vec<bool>,
}

/// Every minimal distribution of a given total size `sz`, all sharing the
/// set's throughput `thr` (the maximum any member in the set reaches).
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionSet {
    pub sz: u64,
    pub thr: Rational,
    pub members: Vec<Distribution>,
}

/// The trade-off curve: one [`DistributionSet`] per distinct size reached
/// during exploration, strictly ascending by size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParetoList(pub Vec<DistributionSet>);

/// Result of a batch [`Explorer::analyze`] run: the Pareto points found
/// before an error cut the search short, plus the error itself (`None` on a
/// clean, exhaustive run).
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOutcome {
    pub partial: ParetoList,
    pub error: Option<EngineError>,
}

/// Safety backstop on the number of distribution sets a single search will
/// explore, in case a pathological graph never reaches its throughput bound
/// and the checklist grows without bound.
const MAX_EXPLORED_SETS: usize = 100_000;

/// Explores the throughput/storage-size trade-off space of a graph by
/// growing storage distributions from the lower bound, guided by the
/// dependency channels each simulation run reports.
pub struct Explorer<'g, G: GraphView> {
    g: &'g G,
    sim: Simulator<'g, G>,
    bounds: Bounds,
    checklist: BTreeMap<u64, DistributionSet>,
    prev_explored_thr: Option<Rational>,
    last_pareto_thr: Option<Rational>,
    explored_any: bool,
    exhausted: bool,
}

impl<'g, G: GraphView> Explorer<'g, G> {
    pub fn new(g: &'g G) -> Self {
        let bounds = Bounds::compute(g);
        Explorer {
            g,
            sim: Simulator::new(g),
            bounds,
            checklist: BTreeMap::new(),
            prev_explored_thr: None,
            last_pareto_thr: None,
            explored_any: false,
            exhausted: false,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Runs the full search to `thr_bound` (or until the space is exhausted)
    /// in one call, returning every Pareto point found.
    pub fn analyze(g: &'g G, thr_bound: Rational) -> AnalyzeOutcome {
        let mut explorer = Explorer::new(g);
        explorer.seed_initial_distribution();

        let mut finished = Vec::new();
        let mut error = None;
        let mut explored = 0usize;

        loop {
            let sz = match explorer.checklist.keys().next().copied() {
                Some(sz) => sz,
                None => break,
            };
            explored += 1;
            if explored > MAX_EXPLORED_SETS {
                error = Some(EngineError::ResourceExhausted(
                    "exploring storage distributions".into(),
                ));
                break;
            }

            let mut set = explorer.explore_and_minimize(sz);
            explorer.prev_explored_thr = Some(set.thr);
            explorer.explored_any = true;

            let reached_bound = set.thr >= thr_bound || set.thr == explorer.bounds.max_throughput;
            let stop = if thr_bound.is_zero() {
                reached_bound && !set.thr.is_zero()
            } else {
                reached_bound
            };

            if stop {
                apply_degenerate_fixup(&mut set, explored == 1);
                finished.push(set);
                break;
            }
            if set.members.is_empty() {
                continue;
            }
            apply_degenerate_fixup(&mut set, explored == 1);
            finished.push(set);
        }

        AnalyzeOutcome {
            partial: ParetoList(finished),
            error,
        }
    }

    /// Resets the search to its starting point: the lower-bound
    /// distribution as the sole checklist entry.
    pub fn init_search(&mut self) {
        self.checklist.clear();
        self.prev_explored_thr = None;
        self.last_pareto_thr = None;
        self.explored_any = false;
        self.exhausted = false;
        self.seed_initial_distribution();
    }

    /// Explores sets of increasing size until the throughput strictly
    /// improves on the last one returned (or the space is exhausted), then
    /// returns that newly discovered Pareto point.
    pub fn next_pareto(&mut self) -> Option<DistributionSet> {
        if self.exhausted {
            return None;
        }
        if let Some(p) = self.last_pareto_thr {
            if p == self.bounds.max_throughput {
                self.exhausted = true;
                return None;
            }
        }

        loop {
            let sz = match self.checklist.keys().next().copied() {
                Some(sz) => sz,
                None => {
                    self.exhausted = true;
                    return None;
                }
            };

            let mut set = self.explore_and_minimize(sz);
            self.prev_explored_thr = Some(set.thr);
            let was_first = !self.explored_any;
            self.explored_any = true;

            let better = match self.last_pareto_thr {
                None => !set.thr.is_zero(),
                Some(p) => set.thr > p,
            };

            if better {
                self.last_pareto_thr = Some(set.thr);
                if set.thr == self.bounds.max_throughput {
                    self.checklist.clear();
                    self.exhausted = true;
                }
                apply_degenerate_fixup(&mut set, was_first);
                return Some(set);
            }
        }
    }

    fn seed_initial_distribution(&mut self) {
        let initial = Distribution {
            cap: self.bounds.min_sz.clone(),
            sz: self.bounds.lb_distribution_sz,
            thr: Rational::ZERO,
            dep: vec![false; self.g.num_channels()],
        };
        add_to_checklist(&mut self.checklist, initial);
    }

    /// Runs every member distribution of the set at `sz`, enlarges every
    /// channel a run implicates (skipping self-edges) into new candidate
    /// distributions on the checklist, then drops every member that falls
    /// short of the set's own maximum throughput.
    fn explore_and_minimize(&mut self, sz: u64) -> DistributionSet {
        let mut set = self
            .checklist
            .remove(&sz)
            .expect("sz taken from the checklist's own key set");

        simulate_members(&self.sim, &mut set.members);
        for d in &set.members {
            if d.thr > set.thr {
                set.thr = d.thr;
            }
        }

        for d in &set.members {
            for c in self.g.channels() {
                if !d.dep[c.0] {
                    continue;
                }
                if self.g.src_actor(c) == self.g.dst_actor(c) {
                    continue;
                }
                let step = self.bounds.min_step[c.0];
                let mut cap = d.cap.clone();
                cap[c.0] += step;
                let candidate = Distribution {
                    cap,
                    sz: d.sz + step,
                    thr: Rational::ZERO,
                    dep: vec![false; self.g.num_channels()],
                };
                add_to_checklist(&mut self.checklist, candidate);
            }
        }

        if self.prev_explored_thr == Some(set.thr) {
            set.members.clear();
        } else {
            let thr = set.thr;
            set.members.retain(|d| d.thr >= thr);
        }
        set
    }
}

fn add_to_checklist(checklist: &mut BTreeMap<u64, DistributionSet>, d: Distribution) -> bool {
    let set = checklist.entry(d.sz).or_insert_with(|| DistributionSet {
        sz: d.sz,
        thr: Rational::ZERO,
        members: Vec::new(),
    });
    if set.members.iter().any(|m| m.cap == d.cap) {
        return false;
    }
    set.members.push(d);
    true
}

#[cfg(not(feature = "parallel"))]
fn simulate_members<G: GraphView>(sim: &Simulator<G>, members: &mut [Distribution]) {
    for d in members.iter_mut() {
        let result = sim.simulate(&d.cap);
        d.thr = result.throughput;
        d.dep = result.dep;
    }
}

#[cfg(feature = "parallel")]
fn simulate_members<G: GraphView + Sync>(sim: &Simulator<G>, members: &mut [Distribution]) {
    members.par_iter_mut().for_each(|d| {
        let result = sim.simulate(&d.cap);
        d.thr = result.throughput;
        d.dep = result.dep;
    });
}

/// The lower-bound distribution deadlocks whenever even the smallest
/// reasonable buffers can't sustain production: that result is reported as
/// the size-0, all-zero-capacity distribution rather than the lower bound
/// itself, since the lower bound achieved nothing more than `<0,...,0>` would.
fn apply_degenerate_fixup(set: &mut DistributionSet, is_first_set_explored: bool) {
    if !is_first_set_explored || !set.thr.is_zero() {
        return;
    }
    set.sz = 0;
    if let Some(first) = set.members.first_mut() {
        first.sz = 0;
        for v in first.cap.iter_mut() {
            *v = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn two_actor_cycle() -> crate::graph::Graph {
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1], 1);
        let bb = b.add_actor(vec![2], 1);
        b.add_channel(a, vec![1], bb, vec![1], 0);
        b.add_channel(bb, vec![1], a, vec![1], 1);
        b.build().unwrap()
    }

    #[test]
    fn batch_analyze_reaches_max_throughput_on_minimal_cycle() {
        let g = two_actor_cycle();
        let bounds = Bounds::compute(&g);
        let outcome = Explorer::analyze(&g, bounds.max_throughput);
        assert!(outcome.error.is_none());
        let last = outcome.partial.0.last().unwrap();
        assert_eq!(last.thr, Rational::new(1, 3));
    }

    #[test]
    fn step_mode_yields_strictly_increasing_throughput() {
        let g = two_actor_cycle();
        let mut explorer = Explorer::new(&g);
        explorer.init_search();
        let mut prev = Rational::ZERO;
        let mut saw_any = false;
        while let Some(set) = explorer.next_pareto() {
            assert!(set.thr > prev);
            prev = set.thr;
            saw_any = true;
        }
        assert!(saw_any);
        assert_eq!(prev, Rational::new(1, 3));
    }

    #[test]
    fn self_edge_channel_is_never_enlarged() {
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1], 2);
        b.add_channel(a, vec![1], a, vec![1], 1);
        let g = b.build().unwrap();
        let bounds = Bounds::compute(&g);
        let outcome = Explorer::analyze(&g, bounds.max_throughput);
        // no candidate distribution should ever exceed the lower bound for
        // a single self-edge channel, since it is never selected for
        // enlargement.
        for set in &outcome.partial.0 {
            for d in &set.members {
                assert_eq!(d.cap[0], bounds.min_sz[0]);
            }
        }
    }

    #[test]
    fn deadlocked_lower_bound_is_reported_as_zero_sized() {
        // A two-actor cycle with capacities pinned to zero cannot hold the
        // single initial token, so the lower-bound distribution deadlocks.
        let mut b = GraphBuilder::new();
        let a = b.add_actor(vec![1], 1);
        let bb = b.add_actor(vec![1], 1);
        b.add_channel(a, vec![1], bb, vec![5], 0);
        b.add_channel(bb, vec![5], a, vec![1], 1);
        let g = b.build().unwrap();
        let outcome = Explorer::analyze(&g, Rational::new(1, 1000));
        let first = &outcome.partial.0[0];
        if first.thr.is_zero() {
            assert_eq!(first.sz, 0);
            assert_eq!(first.members[0].cap.iter().sum::<u64>(), 0);
        }
    }
}
