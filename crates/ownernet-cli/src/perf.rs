//! Expansion performance harness.
//!
//! Not a microbenchmark framework. It answers practical questions:
//! - How long does one expansion take on a graph of a given size and shape?
//! - How does latency move with hop limit, threshold and direction?
//! - What throughput do concurrent expansions over one store reach?
//!
//! Run in release mode for meaningful results:
//!
//! ```bash
//! cargo run -p ownernet-cli --release -- perf --companies 50000 --ownerships 300000
//! ```

use crate::synthetic::{self, company_id, GenerateArgs, XorShift64};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures::stream::{self, StreamExt};
use ownernet_core::{
    Direction, ExpandRequest, ExpansionConfig, NetworkError, NetworkExpander, StoreGraph,
};
use ownernet_store::OwnershipDB;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Args, Debug, Clone)]
pub(crate) struct PerfArgs {
    #[arg(long, default_value_t = 20_000)]
    people: usize,

    #[arg(long, default_value_t = 10_000)]
    companies: usize,

    #[arg(long, default_value_t = 60_000)]
    ownerships: usize,

    #[arg(long, default_value_t = 5_000)]
    board_positions: usize,

    #[arg(long, default_value_t = 2_000)]
    partnerships: usize,

    /// Number of expansions to time.
    #[arg(long, default_value_t = 500)]
    expansions: usize,

    #[arg(long, default_value_t = 4)]
    max_hops: u8,

    #[arg(long, default_value_t = 0.1)]
    min_percentage: f64,

    #[arg(long, default_value = "both")]
    direction: Direction,

    /// Concurrent expansions in the throughput phase.
    #[arg(long, default_value_t = 8)]
    parallel: usize,

    /// RNG seed (deterministic).
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Write the report as JSON.
    #[arg(long)]
    out_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct PerfReport {
    entities: usize,
    relationships: usize,
    build_secs: f64,
    expansions: usize,
    max_hops: u8,
    min_percentage: f64,
    direction: Direction,
    latency_mean_ms: f64,
    latency_p50_ms: f64,
    latency_p95_ms: f64,
    latency_max_ms: f64,
    mean_nodes: f64,
    mean_edges: f64,
    truncated: usize,
    parallel: usize,
    parallel_secs: f64,
    parallel_rate: f64,
}

fn rate(items: usize, dt: Duration) -> f64 {
    let secs = dt.as_secs_f64();
    if secs == 0.0 {
        return f64::INFINITY;
    }
    items as f64 / secs
}

fn percentile_ms(sorted: &[Duration], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)].as_secs_f64() * 1_000.0
}

pub(crate) fn cmd_perf(args: &PerfArgs) -> Result<()> {
    let generate = GenerateArgs {
        people: args.people,
        companies: args.companies,
        ownerships: args.ownerships,
        board_positions: args.board_positions,
        partnerships: args.partnerships,
        seed: args.seed,
        out: None,
    };

    let start = Instant::now();
    let doc = synthetic::build_document(&generate)?;
    let db = OwnershipDB::from_document(&doc).context("synthetic document failed to import")?;
    let build_time = start.elapsed();
    let entities = db.entity_count();
    let relationships = db.relationship_count();

    let mut rng = XorShift64::new(args.seed ^ 0x5eed);
    let requests: Vec<ExpandRequest> = (0..args.expansions)
        .map(|_| {
            ExpandRequest::new(company_id(rng.gen_range_usize(args.companies)))
                .max_hops(args.max_hops)
                .min_percentage(args.min_percentage)
                .direction(args.direction)
        })
        .collect();

    let config = ExpansionConfig {
        timeout_ms: 0,
        ..ExpansionConfig::default()
    };
    let expander = NetworkExpander::with_config(StoreGraph::new(db), config);
    let rt = crate::runtime()?;

    // Sequential latency.
    let mut latencies = Vec::with_capacity(requests.len());
    let mut total_nodes = 0usize;
    let mut total_edges = 0usize;
    let mut truncated = 0usize;
    for request in &requests {
        let t0 = Instant::now();
        let result = rt.block_on(expander.expand(request))?;
        latencies.push(t0.elapsed());
        total_nodes += result.stats.node_count;
        total_edges += result.stats.edge_count;
        truncated += usize::from(result.stats.truncated);
    }
    let total: Duration = latencies.iter().sum();
    latencies.sort();

    // Concurrent throughput over the same store.
    let parallel = args.parallel.max(1);
    let shared = &expander;
    let t0 = Instant::now();
    let outcomes: Vec<Result<usize, NetworkError>> = rt.block_on(
        stream::iter(&requests)
            .map(move |request| async move {
                shared.expand(request).await.map(|r| r.stats.node_count)
            })
            .buffer_unordered(parallel)
            .collect(),
    );
    let parallel_time = t0.elapsed();
    for outcome in outcomes {
        outcome?;
    }

    let n = requests.len().max(1) as f64;
    let report = PerfReport {
        entities,
        relationships,
        build_secs: build_time.as_secs_f64(),
        expansions: requests.len(),
        max_hops: args.max_hops,
        min_percentage: args.min_percentage,
        direction: args.direction,
        latency_mean_ms: total.as_secs_f64() * 1_000.0 / n,
        latency_p50_ms: percentile_ms(&latencies, 0.50),
        latency_p95_ms: percentile_ms(&latencies, 0.95),
        latency_max_ms: latencies.last().map_or(0.0, |d| d.as_secs_f64() * 1_000.0),
        mean_nodes: total_nodes as f64 / n,
        mean_edges: total_edges as f64 / n,
        truncated,
        parallel,
        parallel_secs: parallel_time.as_secs_f64(),
        parallel_rate: rate(requests.len(), parallel_time),
    };
    print_report(&report);

    if let Some(out) = &args.out_json {
        std::fs::write(out, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write {}", out.display()))?;
        eprintln!(
            "{} {}",
            "wrote".green().bold(),
            out.display().to_string().bold()
        );
    }
    Ok(())
}

fn print_report(r: &PerfReport) {
    println!("{}", "Expansion perf".green().bold());
    println!(
        "  graph:      entities={} relationships={} build={:.3}s",
        r.entities, r.relationships, r.build_secs
    );
    println!(
        "  workload:   expansions={} max_hops={} min%={} direction={:?}",
        r.expansions, r.max_hops, r.min_percentage, r.direction
    );
    println!(
        "  latency:    mean={:.3}ms p50={:.3}ms p95={:.3}ms max={:.3}ms",
        r.latency_mean_ms, r.latency_p50_ms, r.latency_p95_ms, r.latency_max_ms
    );
    println!(
        "  size:       mean_nodes={:.1} mean_edges={:.1} truncated={}",
        r.mean_nodes, r.mean_edges, r.truncated
    );
    println!(
        "  throughput: parallel={} time={:.3}s ({:.1} expansions/s)",
        r.parallel, r.parallel_secs, r.parallel_rate
    );
}
