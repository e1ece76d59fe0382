//! Graph inverter: re-roots an agent's graph at a vertex other than `/phys`,
//! relabeling the spine with caller-supplied upstream connector names.

use crate::devpath::graph::{bfs_from, find_vertex, TopologyGraph, VertexId};
use crate::error::ConfigError;

/// One `invert_op` from a `MergeSpec`.
#[derive(Debug, Clone)]
pub struct InvertOp {
    pub agent: String,
    pub new_root_local_devpath: String,
    pub upstream_connectors: Vec<String>,
}

fn segments_after_phys(path: &str) -> Vec<&str> {
    path.strip_prefix("/phys")
        .unwrap_or(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Applies `op` to `graph` in place, re-rooting it at `new_root_local_devpath`.
pub fn invert_graph(graph: &mut TopologyGraph, op: &InvertOp) -> Result<(), ConfigError> {
    let segs = segments_after_phys(&op.new_root_local_devpath);
    let depth = segs.len();

    if op.upstream_connectors.len() != depth {
        return Err(ConfigError::InvertConnectorCountMismatch {
            agent: op.agent.clone(),
            devpath: op.new_root_local_devpath.clone(),
            got: op.upstream_connectors.len(),
            want: depth,
        });
    }

    // v[0] is the old root, v[depth] is the new root.
    let mut spine: Vec<VertexId> = Vec::with_capacity(depth + 1);
    let mut prefix = String::from("/phys");
    spine.push(find_vertex(graph, &op.agent, &prefix).ok_or_else(|| {
        ConfigError::InvertVertexNotFound {
            agent: op.agent.clone(),
            devpath: prefix.clone(),
        }
    })?);
    for seg in &segs {
        prefix.push('/');
        prefix.push_str(seg);
        let v = find_vertex(graph, &op.agent, &prefix).ok_or_else(|| {
            ConfigError::InvertVertexNotFound {
                agent: op.agent.clone(),
                devpath: prefix.clone(),
            }
        })?;
        spine.push(v);
    }

    // Reverse each spine edge v[k] -> v[k+1] into v[k+1] -> v[k].
    for k in 0..depth {
        let (from, to) = (spine[k], spine[k + 1]);
        if let Some(e) = graph.find_edge(from, to) {
            graph.remove_edge(e);
        }
        if graph.find_edge(to, from).is_none() {
            graph.add_edge(to, from, ());
        }
    }

    // Relabel the spine: new root becomes "/phys", the rest take the
    // supplied upstream connector names.
    let new_root = spine[depth];
    graph[new_root].global_devpath = "/phys".to_string();
    for i in 0..depth {
        graph[spine[i]].global_devpath = format!("/{}", op.upstream_connectors[i]);
    }

    // Every other vertex is reduced to just its last segment, to be
    // rebuilt below by the breadth-first relabel pass from the new root.
    let spine_set: std::collections::HashSet<VertexId> = spine.iter().copied().collect();
    for v in graph.node_indices().collect::<Vec<_>>() {
        if !spine_set.contains(&v) {
            let reduced = format!("/{}", last_segment(&graph[v].global_devpath));
            graph[v].global_devpath = reduced;
        }
    }

    // Breadth-first from the new root: each child's label becomes its
    // parent's (already final) label plus its own reduced suffix.
    for v in bfs_from(graph, new_root) {
        if v == new_root {
            continue;
        }
        let parent = crate::devpath::graph::parent_of(graph, v)
            .expect("every non-root vertex has a parent after inversion");
        let child_suffix = graph[v].global_devpath.clone();
        let parent_label = graph[parent].global_devpath.clone();
        graph[v].global_devpath = format!("{parent_label}{child_suffix}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devpath::generator::generate_graph;
    use crate::devpath::graph::find_vertex_by_global;

    fn devpaths(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hammurabi_inverted_graph() {
        let paths = devpaths(&["/phys", "/phys/J7", "/phys/J7/DOWNLINK", "/phys/J2", "/phys/J3"]);
        let mut g = generate_graph("hmb", &paths).unwrap();

        let op = InvertOp {
            agent: "hmb".to_string(),
            new_root_local_devpath: "/phys/J7/DOWNLINK".to_string(),
            upstream_connectors: vec!["DOWNLINK".to_string(), "J14".to_string()],
        };
        invert_graph(&mut g, &op).unwrap();

        assert!(find_vertex_by_global(&g, "/phys").is_some());
        assert!(find_vertex_by_global(&g, "/phys/J14").is_some());
        assert!(find_vertex_by_global(&g, "/phys/J14/DOWNLINK").is_some());
        assert!(find_vertex_by_global(&g, "/phys/J14/DOWNLINK/J2").is_some());
        assert!(find_vertex_by_global(&g, "/phys/J14/DOWNLINK/J3").is_some());
    }

    #[test]
    fn missing_upstream_connector_count_fails() {
        let paths = devpaths(&["/phys", "/phys/J7", "/phys/J7/DOWNLINK"]);
        let mut g = generate_graph("hmb", &paths).unwrap();
        let op = InvertOp {
            agent: "hmb".to_string(),
            new_root_local_devpath: "/phys/J7/DOWNLINK".to_string(),
            upstream_connectors: vec!["DOWNLINK".to_string()],
        };
        let err = invert_graph(&mut g, &op).unwrap_err();
        assert!(matches!(err, ConfigError::InvertConnectorCountMismatch { .. }));
    }

    #[test]
    fn missing_new_root_vertex_fails() {
        let paths = devpaths(&["/phys", "/phys/J7"]);
        let mut g = generate_graph("hmb", &paths).unwrap();
        let op = InvertOp {
            agent: "hmb".to_string(),
            new_root_local_devpath: "/phys/J7/DOWNLINK".to_string(),
            upstream_connectors: vec!["DOWNLINK".to_string(), "J14".to_string()],
        };
        let err = invert_graph(&mut g, &op).unwrap_err();
        assert!(matches!(err, ConfigError::InvertVertexNotFound { .. }));
    }
}
