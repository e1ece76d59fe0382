//! Per-agent graph generator: builds one agent's devpath topology tree from
//! a flat, unordered list of local plugin devpaths.

use std::collections::HashMap;

use crate::devpath::graph::{has_cycle, TopologyGraph, Vertex, VertexId};
use crate::devpath::vocab::devpath_components;
use crate::error::GeneratorError;

/// Builds `agent`'s topology graph from its reported plugin devpaths.
///
/// Devpaths carrying a `:connector:`/`:device:` suffix are rejected: this
/// generator consumes only plugin (bare-path) devpaths. Sorting the input
/// lexicographically first guarantees `/phys` precedes all descendants and
/// every parent precedes its children, so a single left-to-right pass over
/// segment prefixes suffices to place every vertex.
pub fn generate_graph(agent: &str, devpaths: &[String]) -> Result<TopologyGraph, GeneratorError> {
    let mut sorted: Vec<String> = Vec::with_capacity(devpaths.len());
    for d in devpaths {
        let components = devpath_components(d)?;
        if components.ns.is_some() {
            return Err(GeneratorError::UnexpectedSuffix(d.clone()));
        }
        sorted.push(components.path);
    }
    sorted.sort();
    sorted.dedup();

    let mut graph = TopologyGraph::new();
    let mut by_prefix: HashMap<String, VertexId> = HashMap::new();

    for path in &sorted {
        let segments: Vec<&str> = path.split('/').skip(1).collect();
        let mut prefix = String::new();
        let mut previous: Option<VertexId> = None;
        for (i, seg) in segments.iter().enumerate() {
            if i == 0 {
                prefix.push_str("/phys");
            } else {
                prefix.push('/');
                prefix.push_str(seg);
            }
            let vertex_id = match by_prefix.get(&prefix) {
                Some(&id) => id,
                None => {
                    let id = graph.add_node(Vertex::new(prefix.clone(), agent, prefix.clone()));
                    by_prefix.insert(prefix.clone(), id);
                    id
                }
            };
            if let Some(p) = previous {
                if p != vertex_id && graph.find_edge(p, vertex_id).is_none() {
                    graph.add_edge(p, vertex_id, ());
                }
            }
            previous = Some(vertex_id);
        }
    }

    if has_cycle(&graph) {
        return Err(GeneratorError::CycleDetected(agent.to_string()));
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devpath::graph::find_vertex;

    fn devpaths(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_input_is_an_empty_graph() {
        let g = generate_graph("a1", &[]).unwrap();
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn builds_a_tree_rooted_at_phys() {
        let paths = devpaths(&["/phys/A/B", "/phys", "/phys/A"]);
        let g = generate_graph("a1", &paths).unwrap();
        assert_eq!(g.node_count(), 3);

        let root = find_vertex(&g, "a1", "/phys").unwrap();
        let a = find_vertex(&g, "a1", "/phys/A").unwrap();
        let b = find_vertex(&g, "a1", "/phys/A/B").unwrap();
        assert!(g.find_edge(root, a).is_some());
        assert!(g.find_edge(a, b).is_some());
        assert!(!has_cycle(&g));
    }

    #[test]
    fn rejects_suffixed_devpaths() {
        let paths = devpaths(&["/phys", "/phys/A:connector:PE0"]);
        let err = generate_graph("a1", &paths).unwrap_err();
        assert!(matches!(err, GeneratorError::UnexpectedSuffix(_)));
    }

    #[test]
    fn rejects_malformed_devpaths() {
        let paths = devpaths(&["not-a-devpath"]);
        assert!(generate_graph("a1", &paths).is_err());
    }

    #[test]
    fn twenty_seven_plugin_sample_tree() {
        let mut paths = vec!["/phys".to_string()];
        for i in 0..24 {
            paths.push(format!("/phys/DIMM{i}"));
        }
        for i in 0..2 {
            paths.push(format!("/phys/CPU{i}"));
        }
        let g = generate_graph("a1", &paths).unwrap();
        assert_eq!(g.node_count(), 27);
    }
}
