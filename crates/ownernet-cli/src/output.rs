//! Plain-text tables for terminal output.

use colored::Colorize;
use ownernet_core::{NetworkResult, Reach};
use ownernet_store::{EntitySummary, SearchHit};
use std::fmt::Write;

fn reach_label(reach: Reach) -> &'static str {
    match reach {
        Reach::Seed => "seed",
        Reach::Outgoing => "owned",
        Reach::Incoming => "owner",
        Reach::Both => "both",
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

pub(crate) fn render_network(result: &NetworkResult) -> String {
    let mut out = String::new();
    let stats = &result.stats;
    let _ = writeln!(
        out,
        "{} {} ({} hops, ≥{}%, {:?}, {:?})",
        "Network of".green().bold(),
        result.request.seed.bold(),
        result.request.max_hops,
        result.request.min_percentage,
        result.request.direction,
        result.aggregation,
    );
    let _ = writeln!(
        out,
        "{:<20} {:<28} {:<8} {:>9} {:>4} {:>6}  {}",
        "ID", "NAME", "KIND", "EFFECTIVE", "HOPS", "PATHS", "REACH"
    );

    let mut nodes: Vec<_> = result.nodes.iter().collect();
    nodes.sort_by(|a, b| {
        a.hop_distance
            .cmp(&b.hop_distance)
            .then_with(|| b.effective_percentage.total_cmp(&a.effective_percentage))
            .then_with(|| a.entity.id.cmp(&b.entity.id))
    });
    for node in nodes {
        let _ = writeln!(
            out,
            "{:<20} {:<28} {:<8} {:>9} {:>4} {:>6}  {}",
            truncate(&node.entity.id, 20),
            truncate(&node.entity.name, 28),
            node.entity.kind.to_string(),
            node.effective_percentage.to_string(),
            node.hop_distance,
            node.path_count,
            reach_label(node.reached),
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "Edges".bold());
    for edge in &result.edges {
        let pct = edge
            .percentage
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {} -[{} {}]-> {}",
            edge.source,
            edge.kind,
            pct,
            edge.target
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "nodes={} edges={} depth={} paths={} fetches={} elapsed={:.3}ms",
        stats.node_count,
        stats.edge_count,
        stats.max_depth,
        stats.paths_retained,
        stats.store_fetches,
        stats.elapsed_micros as f64 / 1_000.0,
    );
    if stats.truncated {
        let _ = writeln!(
            out,
            "{} size cap reached; result is truncated",
            "warning:".yellow().bold()
        );
    }
    out
}

pub(crate) fn render_summary(summary: &EntitySummary) -> String {
    let mut out = String::new();
    let dash = || "-".to_string();
    let _ = writeln!(out, "{} {}", summary.kind.bold(), summary.id.bold());
    let _ = writeln!(
        out,
        "  name:                {}",
        summary.name.clone().unwrap_or_else(dash)
    );
    let _ = writeln!(
        out,
        "  jurisdiction:        {}",
        summary.jurisdiction.clone().unwrap_or_else(dash)
    );
    let _ = writeln!(
        out,
        "  status:              {}",
        summary.status.clone().unwrap_or_else(dash)
    );
    let _ = writeln!(
        out,
        "  direct subsidiaries: {}",
        summary.direct_subsidiaries
    );
    let _ = writeln!(out, "  direct owners:       {}", summary.direct_owners);
    out
}

pub(crate) fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    let mut out = String::new();
    if hits.is_empty() {
        let _ = writeln!(out, "no entities match `{query}`");
        return out;
    }
    for hit in hits {
        let _ = writeln!(out, "{:<20} {:<8} {}", hit.id, hit.kind, hit.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ownernet_core::{
        AggregationMode, EntityKind, ExpandRequest, NetworkNode, NetworkStats, OwnershipEdge,
        Percentage,
    };

    fn node(id: &str, pct: f64, hops: u8, reached: Reach) -> NetworkNode {
        NetworkNode {
            entity: ownernet_core::Entity {
                id: id.to_string(),
                kind: EntityKind::Company,
                name: format!("{id} Holdings"),
                attributes: Default::default(),
            },
            effective_percentage: Percentage::try_new(pct).unwrap(),
            hop_distance: hops,
            reached,
            path_count: 1,
            strongest_path: vec![],
        }
    }

    #[test]
    fn test_network_table_lists_nodes_by_distance() {
        colored::control::set_override(false);
        let result = NetworkResult {
            request: ExpandRequest::new("S"),
            aggregation: AggregationMode::Strongest,
            nodes: vec![
                node("A", 16.0, 2, Reach::Outgoing),
                node("S", 100.0, 0, Reach::Seed),
                node("T", 30.0, 1, Reach::Outgoing),
            ],
            edges: vec![OwnershipEdge::ownership(
                "S",
                "T",
                Percentage::try_new(30.0).unwrap(),
            )],
            stats: NetworkStats {
                node_count: 3,
                edge_count: 1,
                max_depth: 2,
                paths_retained: 2,
                store_fetches: 5,
                truncated: true,
                elapsed_micros: 1_500,
            },
        };

        let text = render_network(&result);
        let s = text.find("S Holdings").unwrap();
        let t = text.find("T Holdings").unwrap();
        let a = text.find("A Holdings").unwrap();
        assert!(s < t && t < a);
        assert!(text.contains("S -[owns 30.00%]-> T"));
        assert!(text.contains("nodes=3 edges=1 depth=2"));
        assert!(text.contains("truncated"));
    }

    #[test]
    fn test_long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[test]
    fn test_empty_search_says_so() {
        assert!(render_hits("zz", &[]).contains("no entities match `zz`"));
    }
}
