//! Builds a small two-actor CSDFG and prints its Pareto curve of minimal
//! storage distributions. Not part of the library's public contract; wires
//! up `env_logger` so `RUST_LOG=trace` shows simulator step tracing.

use csdf_tradeoff::{Explorer, GraphBuilder};

fn main() {
    env_logger::init();

    let mut builder = GraphBuilder::new();
    let a = builder.add_actor(vec![1], 1);
    let b = builder.add_actor(vec![2], 1);
    builder.add_channel(a, vec![1], b, vec![1], 0);
    builder.add_channel(b, vec![1], a, vec![1], 1);
    let graph = builder.build().expect("demo graph is well-formed");

    let bounds = Explorer::new(&graph).bounds().clone();
    println!(
        "lower bound size = {}, max throughput = {}",
        bounds.lb_distribution_sz, bounds.max_throughput
    );

    let outcome = Explorer::analyze(&graph, bounds.max_throughput);
    for set in &outcome.partial.0 {
        println!("size {:>3}: throughput {}", set.sz, set.thr);
    }
    if let Some(err) = outcome.error {
        eprintln!("search cut short: {err}");
    }
}
