mod support;

use ownernet_core::{
    expand_network, AggregationMode, CachedExpander, CancellationToken, Direction, EdgeKind,
    ExpandRequest, ExpansionConfig, NetworkError, NetworkExpander, Reach, StructuralEdgePolicy,
};
use std::sync::Arc;
use std::time::Duration;
use support::{pct, MemoryGraph};

fn config() -> ExpansionConfig {
    ExpansionConfig::default()
}

async fn expand(graph: MemoryGraph, request: ExpandRequest) -> ownernet_core::NetworkResult {
    NetworkExpander::new(graph)
        .expand(&request)
        .await
        .expect("expansion succeeds")
}

// ============================================================================
// Worked scenarios
// ============================================================================

#[tokio::test]
async fn test_direct_holding() {
    let graph = MemoryGraph::new().owns("S", "T", 30.0);
    let result = expand(
        graph,
        ExpandRequest::new("S").max_hops(1).min_percentage(10.0),
    )
    .await;

    assert_eq!(result.entity_ids(), vec!["S", "T"]);
    let t = result.node("T").unwrap();
    assert_eq!(t.effective_percentage, pct(30.0));
    assert_eq!(t.hop_distance, 1);
    assert_eq!(t.reached, Reach::Outgoing);
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edge("S", "T").unwrap().percentage, Some(pct(30.0)));

    let seed = result.node("S").unwrap();
    assert_eq!(seed.effective_percentage, pct(100.0));
    assert_eq!(seed.reached, Reach::Seed);
    assert_eq!(seed.hop_distance, 0);

    assert_eq!(result.stats.node_count, 2);
    assert_eq!(result.stats.edge_count, 1);
    assert_eq!(result.stats.max_depth, 1);
    assert_eq!(result.stats.paths_retained, 1);
    assert!(!result.stats.truncated);
}

#[tokio::test]
async fn test_chain_multiplies_and_respects_hop_budget() {
    let graph = || MemoryGraph::new().owns("S", "A", 40.0).owns("A", "B", 40.0);

    let two = expand(
        graph(),
        ExpandRequest::new("S").max_hops(2).min_percentage(10.0),
    )
    .await;
    let b = two.node("B").unwrap();
    assert_eq!(b.effective_percentage, pct(16.0));
    assert_eq!(b.hop_distance, 2);
    assert_eq!(b.strongest_path, vec!["S", "A", "B"]);

    let one = expand(
        graph(),
        ExpandRequest::new("S").max_hops(1).min_percentage(10.0),
    )
    .await;
    assert_eq!(one.entity_ids(), vec!["A", "S"]);
    assert!(one.edge("A", "B").is_none());
}

#[tokio::test]
async fn test_convergent_paths_keep_strongest_and_all_edges() {
    let graph = || {
        MemoryGraph::new()
            .owns("S", "A", 60.0)
            .owns("S", "C", 30.0)
            .owns("C", "A", 60.0)
    };
    let request = ExpandRequest::new("S").min_percentage(10.0);

    let result = expand(graph(), request.clone()).await;
    let a = result.node("A").unwrap();
    assert_eq!(a.effective_percentage, pct(60.0));
    assert_eq!(a.path_count, 2);
    assert_eq!(a.hop_distance, 1);
    assert_eq!(a.strongest_path, vec!["S", "A"]);

    let keys: Vec<(&str, &str)> = result
        .edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();
    assert_eq!(keys, vec![("C", "A"), ("S", "A"), ("S", "C")]);

    let summed = NetworkExpander::with_config(
        graph(),
        ExpansionConfig {
            aggregation: AggregationMode::Summed,
            ..config()
        },
    )
    .expand(&request)
    .await
    .unwrap();
    assert_eq!(summed.aggregation, AggregationMode::Summed);
    assert_eq!(summed.node("A").unwrap().effective_percentage, pct(78.0));
}

#[tokio::test]
async fn test_cyclic_pair_terminates() {
    let graph = MemoryGraph::new().owns("A", "B", 50.0).owns("B", "A", 50.0);
    let result = expand(graph, ExpandRequest::new("A").max_hops(8)).await;

    assert_eq!(result.entity_ids(), vec!["A", "B"]);
    assert_eq!(result.node("B").unwrap().effective_percentage, pct(50.0));
    let a = result.node("A").unwrap();
    assert_eq!(a.reached, Reach::Seed);
    assert_eq!(a.path_count, 1);
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.stats.max_depth, 1);
}

#[tokio::test]
async fn test_unknown_seed_is_not_found() {
    let graph = Arc::new(MemoryGraph::new().owns("S", "T", 30.0));
    let err = NetworkExpander::new(Arc::clone(&graph))
        .expand(&ExpandRequest::new("missing"))
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::EntityNotFound("missing".to_string()));
    assert_eq!(graph.calls(), 1);
}

// ============================================================================
// Filtering and directions
// ============================================================================

#[tokio::test]
async fn test_threshold_prunes_weak_paths() {
    let graph = MemoryGraph::new()
        .owns("S", "A", 50.0)
        .owns("A", "B", 10.0)
        .owns("S", "W", 5.0);
    let result = expand(graph, ExpandRequest::new("S").min_percentage(6.0)).await;
    // B sits at 5%, W at 5%.
    assert_eq!(result.entity_ids(), vec!["A", "S"]);
}

#[tokio::test]
async fn test_zero_percentage_holdings_are_not_walked() {
    let graph = MemoryGraph::new().owns("S", "A", 0.0);
    let result = expand(graph, ExpandRequest::new("S").min_percentage(0.0)).await;
    assert_eq!(result.entity_ids(), vec!["S"]);
    assert!(result.edges.is_empty());
}

#[tokio::test]
async fn test_incoming_finds_owners() {
    let graph = MemoryGraph::new()
        .person("Q")
        .owns("P", "S", 60.0)
        .owns("Q", "P", 50.0)
        .owns("S", "T", 90.0);
    let result = expand(
        graph,
        ExpandRequest::new("S")
            .direction(Direction::Incoming)
            .max_hops(2),
    )
    .await;

    assert_eq!(result.entity_ids(), vec!["P", "Q", "S"]);
    assert_eq!(result.node("P").unwrap().reached, Reach::Incoming);
    let q = result.node("Q").unwrap();
    assert_eq!(q.effective_percentage, pct(30.0));
    assert_eq!(q.strongest_path, vec!["S", "P", "Q"]);
}

#[tokio::test]
async fn test_both_directions_merge() {
    let graph = MemoryGraph::new()
        .owns("S", "T", 30.0)
        .owns("P", "S", 60.0)
        .owns("X", "S", 20.0)
        .owns("S", "X", 10.0);
    let result = expand(graph, ExpandRequest::new("S").direction(Direction::Both)).await;

    assert_eq!(result.entity_ids(), vec!["P", "S", "T", "X"]);
    assert_eq!(result.node("T").unwrap().reached, Reach::Outgoing);
    assert_eq!(result.node("P").unwrap().reached, Reach::Incoming);

    let x = result.node("X").unwrap();
    assert_eq!(x.reached, Reach::Both);
    assert_eq!(x.effective_percentage, pct(20.0));
    assert_eq!(x.path_count, 2);
    assert_eq!(result.edges.len(), 4);
}

#[tokio::test]
async fn test_structural_edges_follow_policy() {
    let graph = || {
        MemoryGraph::new()
            .person("P")
            .structural("P", "S", EdgeKind::BoardPosition)
            .owns("S", "T", 40.0)
    };
    let request = ExpandRequest::new("S").direction(Direction::Both);

    let excluded = expand(graph(), request.clone()).await;
    assert_eq!(excluded.entity_ids(), vec!["S", "T"]);

    let through = NetworkExpander::with_config(
        graph(),
        ExpansionConfig {
            structural_edges: StructuralEdgePolicy::PassThrough,
            ..config()
        },
    )
    .expand(&request)
    .await
    .unwrap();
    assert_eq!(through.entity_ids(), vec!["P", "S", "T"]);
    assert_eq!(through.node("P").unwrap().effective_percentage, pct(100.0));
    assert_eq!(
        through.edge("P", "S").unwrap().kind,
        EdgeKind::BoardPosition
    );
}

#[tokio::test]
async fn test_parallel_holdings_are_merged() {
    let graph = MemoryGraph::new().owns("S", "A", 10.0).owns("S", "A", 15.0);
    let result = expand(graph, ExpandRequest::new("S")).await;
    assert_eq!(result.edges.len(), 1);
    assert_eq!(result.edges[0].percentage, Some(pct(25.0)));
    assert_eq!(result.node("A").unwrap().effective_percentage, pct(25.0));
}

// ============================================================================
// Parameter validation
// ============================================================================

#[tokio::test]
async fn test_invalid_parameters_fail_before_store_access() {
    let graph = Arc::new(MemoryGraph::new().owns("S", "T", 30.0));
    let expander = NetworkExpander::new(Arc::clone(&graph));

    let bad = [
        ExpandRequest::new("S").max_hops(0),
        ExpandRequest::new("S").max_hops(9),
        ExpandRequest::new("S").min_percentage(50.5),
        ExpandRequest::new("S").min_percentage(-1.0),
        ExpandRequest::new("S").min_percentage(f64::NAN),
        ExpandRequest::new("  "),
    ];
    for request in &bad {
        let err = expander.expand(request).await.unwrap_err();
        assert!(
            matches!(err, NetworkError::InvalidParameters(_)),
            "{request:?} gave {err:?}"
        );
    }
    assert_eq!(graph.calls(), 0);

    let err = NetworkExpander::with_config(
        Arc::clone(&graph),
        ExpansionConfig {
            fetch_concurrency: 0,
            ..config()
        },
    )
    .expand(&ExpandRequest::new("S"))
    .await
    .unwrap_err();
    assert!(matches!(err, NetworkError::InvalidParameters(_)));
}

// ============================================================================
// Caps, timeouts, cancellation, store failures
// ============================================================================

fn star(n: usize) -> MemoryGraph {
    (0..n).fold(MemoryGraph::new(), |g, i| {
        g.owns("S", &format!("T{i:02}"), 10.0)
    })
}

#[tokio::test]
async fn test_node_cap_truncates() {
    let result = NetworkExpander::with_config(
        star(10),
        ExpansionConfig {
            max_nodes: 4,
            ..config()
        },
    )
    .expand(&ExpandRequest::new("S"))
    .await
    .unwrap();
    assert!(result.stats.truncated);
    assert_eq!(result.stats.node_count, 4);
    assert_eq!(result.entity_ids(), vec!["S", "T00", "T01", "T02"]);
}

#[tokio::test]
async fn test_node_cap_keeps_strongest_holdings() {
    let graph = Arc::new(
        MemoryGraph::new()
            .owns("S", "A", 1.0)
            .owns("S", "B", 2.0)
            .owns("S", "Z", 90.0),
    );
    let request = ExpandRequest::new("S").max_hops(1).min_percentage(0.5);

    let one = NetworkExpander::with_config(
        Arc::clone(&graph),
        ExpansionConfig {
            max_nodes: 2,
            ..config()
        },
    )
    .expand(&request)
    .await
    .unwrap();
    assert!(one.stats.truncated);
    assert_eq!(one.entity_ids(), vec!["S", "Z"]);
    assert_eq!(one.node("Z").unwrap().effective_percentage, pct(90.0));

    let two = NetworkExpander::with_config(
        graph,
        ExpansionConfig {
            max_nodes: 3,
            ..config()
        },
    )
    .expand(&request)
    .await
    .unwrap();
    assert!(two.stats.truncated);
    assert_eq!(two.entity_ids(), vec!["B", "S", "Z"]);
}

#[tokio::test]
async fn test_edge_and_path_caps_truncate() {
    let edges = NetworkExpander::with_config(
        star(10),
        ExpansionConfig {
            max_edges: 2,
            ..config()
        },
    )
    .expand(&ExpandRequest::new("S"))
    .await
    .unwrap();
    assert!(edges.stats.truncated);
    assert_eq!(edges.stats.edge_count, 2);
    assert_eq!(edges.stats.node_count, 3);

    let paths = NetworkExpander::with_config(
        star(10),
        ExpansionConfig {
            max_paths: 5,
            ..config()
        },
    )
    .expand(&ExpandRequest::new("S"))
    .await
    .unwrap();
    assert!(paths.stats.truncated);
    assert_eq!(paths.stats.paths_retained, 5);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_no_partial_result() {
    let graph = MemoryGraph::new()
        .owns("S", "A", 50.0)
        .with_delay(Duration::from_millis(50));
    let err = NetworkExpander::with_config(
        graph,
        ExpansionConfig {
            timeout_ms: 20,
            ..config()
        },
    )
    .expand(&ExpandRequest::new("S"))
    .await
    .unwrap_err();
    assert_eq!(
        err,
        NetworkError::ExpansionTimeout(Duration::from_millis(20))
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_timeout_covers_hydration_on_blocking_store() {
    let graph = MemoryGraph::new()
        .owns("S", "T", 30.0)
        .with_blocking_details(Duration::from_millis(40));
    let err = NetworkExpander::with_config(
        graph,
        ExpansionConfig {
            timeout_ms: 50,
            ..config()
        },
    )
    .expand(&ExpandRequest::new("S"))
    .await
    .unwrap_err();
    assert_eq!(
        err,
        NetworkError::ExpansionTimeout(Duration::from_millis(50))
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_disables_budget() {
    let graph = MemoryGraph::new()
        .owns("S", "A", 50.0)
        .with_delay(Duration::from_secs(30));
    let result = NetworkExpander::with_config(
        graph,
        ExpansionConfig {
            timeout_ms: 0,
            ..config()
        },
    )
    .expand(&ExpandRequest::new("S"))
    .await
    .unwrap();
    assert_eq!(result.entity_ids(), vec!["A", "S"]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let graph = Arc::new(MemoryGraph::new().owns("S", "A", 50.0));
    let token = CancellationToken::new();
    token.cancel();
    let err = NetworkExpander::new(Arc::clone(&graph))
        .expand_with_cancel(&ExpandRequest::new("S"), &token)
        .await
        .unwrap_err();
    assert_eq!(err, NetworkError::Cancelled);
    assert_eq!(graph.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_store_reads() {
    let graph = Arc::new(
        MemoryGraph::new()
            .owns("S", "A", 90.0)
            .owns("A", "B", 90.0)
            .owns("B", "C", 90.0)
            .with_delay(Duration::from_millis(50)),
    );
    let expander = NetworkExpander::with_config(
        Arc::clone(&graph),
        ExpansionConfig {
            timeout_ms: 0,
            ..config()
        },
    );
    let request = ExpandRequest::new("S");
    let token = CancellationToken::new();

    let (result, _) = tokio::join!(expander.expand_with_cancel(&request, &token), async {
        tokio::time::sleep(Duration::from_millis(60)).await;
        token.cancel();
    });
    assert_eq!(result.unwrap_err(), NetworkError::Cancelled);

    let calls = graph.calls();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(graph.calls(), calls);
    assert!(calls < 7);
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let graph = MemoryGraph::new()
        .owns("S", "A", 50.0)
        .owns("A", "B", 50.0)
        .unavailable_at("A");
    let err = NetworkExpander::new(graph)
        .expand(&ExpandRequest::new("S"))
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::StoreUnavailable(_)));
    assert!(err.is_transient());
}

// ============================================================================
// Determinism
// ============================================================================

/// Layered graph with convergence, cycles and cross-holdings.
fn tangled() -> MemoryGraph {
    let mut graph = MemoryGraph::new();
    for i in 0..6 {
        for j in 0..6 {
            if i != j && (i * 7 + j * 3) % 4 != 0 {
                let pct = 5.0 + ((i * 13 + j * 29) % 60) as f64;
                graph = graph.owns(&format!("E{i}"), &format!("E{j}"), pct);
            }
        }
    }
    graph
}

#[tokio::test]
async fn test_repeated_expansion_is_identical() {
    let expander = NetworkExpander::new(tangled());
    let request = ExpandRequest::new("E0")
        .max_hops(4)
        .direction(Direction::Both);

    let first = expander.expand(&request).await.unwrap().without_timing();
    let second = expander.expand(&request).await.unwrap().without_timing();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_order_does_not_change_result() {
    let request = ExpandRequest::new("E0")
        .max_hops(4)
        .direction(Direction::Both);
    let sequential = NetworkExpander::with_config(
        tangled(),
        ExpansionConfig {
            fetch_concurrency: 1,
            timeout_ms: 0,
            ..config()
        },
    )
    .expand(&request)
    .await
    .unwrap();
    let parallel = NetworkExpander::with_config(
        tangled().with_jitter(),
        ExpansionConfig {
            fetch_concurrency: 16,
            timeout_ms: 0,
            ..config()
        },
    )
    .expand(&request)
    .await
    .unwrap();
    assert_eq!(sequential.without_timing(), parallel.without_timing());
}

#[tokio::test]
async fn test_expand_network_entry_point() {
    let result = expand_network(
        MemoryGraph::new().owns("S", "T", 30.0),
        &ExpandRequest::new("S"),
        config(),
    )
    .await
    .unwrap();
    assert!(result.contains("T"));
}

// ============================================================================
// Result cache
// ============================================================================

#[tokio::test]
async fn test_cache_hits_until_snapshot_changes() {
    let graph = Arc::new(MemoryGraph::new().owns("S", "T", 30.0).versioned(1));
    let cached = CachedExpander::new(NetworkExpander::new(Arc::clone(&graph)), 8);
    let request = ExpandRequest::new("S");

    let first = cached.expand(&request).await.unwrap();
    let again = cached.expand(&request).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(cached.cache().stats().hits, 1);

    let other = cached
        .expand(&request.clone().min_percentage(40.0))
        .await
        .unwrap();
    assert!(!other.contains("T"));
    assert_eq!(cached.cache().len(), 2);

    graph.bump_version();
    let fresh = cached.expand(&request).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert_eq!(cached.cache().len(), 3);
}

#[tokio::test]
async fn test_unversioned_graphs_are_never_cached() {
    let cached = CachedExpander::new(
        NetworkExpander::new(MemoryGraph::new().owns("S", "T", 30.0)),
        8,
    );
    let request = ExpandRequest::new("S");
    let first = cached.expand(&request).await.unwrap();
    let second = cached.expand(&request).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(cached.cache().is_empty());
}
