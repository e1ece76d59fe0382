//! Graph merger: combines per-agent topology graphs into one machine-wide
//! graph, driven by a declarative `MergeSpec`.

use std::collections::{HashMap, HashSet};

use crate::devpath::graph::{find_vertex, has_cycle, TopologyGraph, Vertex, VertexId};
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub enum MergeOpKind {
    PluggedInNode {
        base_devpath: String,
        appendant_devpath: String,
        connector: String,
    },
    SameNode {
        base_devpath: String,
        appendant_devpath: String,
    },
}

impl MergeOpKind {
    fn base_devpath(&self) -> &str {
        match self {
            MergeOpKind::PluggedInNode { base_devpath, .. } => base_devpath,
            MergeOpKind::SameNode { base_devpath, .. } => base_devpath,
        }
    }

    fn appendant_devpath(&self) -> &str {
        match self {
            MergeOpKind::PluggedInNode { appendant_devpath, .. } => appendant_devpath,
            MergeOpKind::SameNode { appendant_devpath, .. } => appendant_devpath,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOp {
    pub base_agent: String,
    pub appendant_agent: String,
    pub kind: MergeOpKind,
}

#[derive(Debug, Clone)]
pub struct MergeSpec {
    pub root: String,
    pub merge_ops: Vec<MergeOp>,
}

/// The relative path from `u` to `w`, given both are path-consistently
/// labeled vertices of the same per-agent graph (every non-root vertex's
/// `global_devpath` is its parent's plus one more segment). Falls back to
/// `w`'s full label if `w` does not, in fact, descend from `u` -- this
/// should never happen for a well-formed merge spec.
fn suffix_of(w_global: &str, u_global: &str) -> String {
    w_global.strip_prefix(u_global).unwrap_or(w_global).to_string()
}

fn apply_op(
    base: &mut TopologyGraph,
    per_agent: &HashMap<String, TopologyGraph>,
    op: &MergeOp,
) -> Result<(), ConfigError> {
    let v = find_vertex(base, &op.base_agent, op.kind.base_devpath()).ok_or_else(|| {
        ConfigError::MergeVertexNotFound {
            agent: op.base_agent.clone(),
            devpath: op.kind.base_devpath().to_string(),
        }
    })?;
    let a_graph = per_agent.get(&op.appendant_agent).ok_or_else(|| {
        ConfigError::UnknownRootAgent(op.appendant_agent.clone())
    })?;
    let u = find_vertex(a_graph, &op.appendant_agent, op.kind.appendant_devpath()).ok_or_else(|| {
        ConfigError::MergeVertexNotFound {
            agent: op.appendant_agent.clone(),
            devpath: op.kind.appendant_devpath().to_string(),
        }
    })?;

    let v_global = base[v].global_devpath.clone();
    let u_global = a_graph[u].global_devpath.clone();

    let mut map: HashMap<VertexId, VertexId> = HashMap::new();
    for w in a_graph.node_indices() {
        let suffix = suffix_of(&a_graph[w].global_devpath, &u_global);
        let new_global = match &op.kind {
            MergeOpKind::PluggedInNode { connector, .. } => {
                format!("{v_global}/{connector}{suffix}")
            }
            MergeOpKind::SameNode { .. } => format!("{v_global}{suffix}"),
        };
        let new_vertex = Vertex {
            global_devpath: new_global,
            local_pairs: a_graph[w].local_pairs.clone(),
        };
        map.insert(w, base.add_node(new_vertex));
    }
    for e in a_graph.edge_indices() {
        let (s, t) = a_graph.edge_endpoints(e).expect("edge exists");
        base.add_edge(map[&s], map[&t], ());
    }

    let mapped_u = map[&u];
    match &op.kind {
        MergeOpKind::PluggedInNode { .. } => {
            base.add_edge(v, mapped_u, ());
        }
        MergeOpKind::SameNode { .. } => {
            let children: Vec<VertexId> = base
                .neighbors_directed(mapped_u, petgraph::Direction::Outgoing)
                .collect();
            for x in children {
                base.add_edge(v, x, ());
            }
            let absorbed_pairs = base[mapped_u].local_pairs.clone();
            base[v].local_pairs.extend(absorbed_pairs);
            base.remove_node(mapped_u);
        }
    }

    Ok(())
}

/// Merges `per_agent` graphs into one machine graph per `spec`.
pub fn merge_graphs(
    mut per_agent: HashMap<String, TopologyGraph>,
    spec: &MergeSpec,
) -> Result<TopologyGraph, ConfigError> {
    let mut base = per_agent
        .remove(&spec.root)
        .ok_or_else(|| ConfigError::UnknownRootAgent(spec.root.clone()))?;

    let mut appended: HashSet<String> = HashSet::from([spec.root.clone()]);
    let mut applied = vec![false; spec.merge_ops.len()];
    let mut progress = true;
    while progress {
        progress = false;
        for (i, op) in spec.merge_ops.iter().enumerate() {
            if applied[i] || !appended.contains(&op.base_agent) {
                continue;
            }
            apply_op(&mut base, &per_agent, op)?;
            appended.insert(op.appendant_agent.clone());
            applied[i] = true;
            progress = true;
        }
    }

    if applied.iter().any(|done| !done) {
        return Err(ConfigError::SpecUnsatisfiable(spec.root.clone()));
    }

    if has_cycle(&base) {
        return Err(ConfigError::CycleDetected);
    }

    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devpath::generator::generate_graph;
    use crate::devpath::graph::{find_vertex_by_global, parent_of};

    fn graph(agent: &str, paths: &[&str]) -> TopologyGraph {
        let owned: Vec<String> = paths.iter().map(|s| s.to_string()).collect();
        generate_graph(agent, &owned).unwrap()
    }

    #[test]
    fn linear_merge_scenario() {
        let mut per_agent = HashMap::new();
        per_agent.insert("a1".to_string(), graph("a1", &["/phys", "/phys/A", "/phys/A/B"]));
        per_agent.insert("a2".to_string(), graph("a2", &["/phys", "/phys/C", "/phys/C/D"]));
        per_agent.insert("a3".to_string(), graph("a3", &["/phys", "/phys/E", "/phys/E/F"]));
        per_agent.insert("a4".to_string(), graph("a4", &["/phys", "/phys/G", "/phys/G/H"]));

        let spec = MergeSpec {
            root: "a1".to_string(),
            merge_ops: vec![
                MergeOp {
                    base_agent: "a1".to_string(),
                    appendant_agent: "a2".to_string(),
                    kind: MergeOpKind::PluggedInNode {
                        base_devpath: "/phys/A/B".to_string(),
                        appendant_devpath: "/phys".to_string(),
                        connector: "PADS1".to_string(),
                    },
                },
                MergeOp {
                    base_agent: "a1".to_string(),
                    appendant_agent: "a3".to_string(),
                    kind: MergeOpKind::SameNode {
                        base_devpath: "/phys/A/B".to_string(),
                        appendant_devpath: "/phys".to_string(),
                    },
                },
                MergeOp {
                    base_agent: "a2".to_string(),
                    appendant_agent: "a4".to_string(),
                    kind: MergeOpKind::PluggedInNode {
                        base_devpath: "/phys/C".to_string(),
                        appendant_devpath: "/phys".to_string(),
                        connector: "PADS2".to_string(),
                    },
                },
            ],
        };

        let merged = merge_graphs(per_agent, &spec).unwrap();

        let g_h = find_vertex_by_global(&merged, "/phys/A/B/PADS1/C/PADS2/G/H");
        assert!(g_h.is_some());

        let ab = find_vertex_by_global(&merged, "/phys/A/B").unwrap();
        let agents: HashSet<&str> = merged[ab]
            .local_pairs
            .iter()
            .map(|p| p.agent.as_str())
            .collect();
        assert_eq!(agents, HashSet::from(["a1", "a3"]));
        assert!(!has_cycle(&merged));
        assert!(parent_of(&merged, ab).is_some());
    }

    #[test]
    fn unsatisfiable_spec_fails() {
        let mut per_agent = HashMap::new();
        per_agent.insert("a1".to_string(), graph("a1", &["/phys"]));
        per_agent.insert("a2".to_string(), graph("a2", &["/phys"]));

        let spec = MergeSpec {
            root: "a1".to_string(),
            merge_ops: vec![MergeOp {
                base_agent: "a3".to_string(),
                appendant_agent: "a2".to_string(),
                kind: MergeOpKind::SameNode {
                    base_devpath: "/phys".to_string(),
                    appendant_devpath: "/phys".to_string(),
                },
            }],
        };

        let err = merge_graphs(per_agent, &spec).unwrap_err();
        assert!(matches!(err, ConfigError::SpecUnsatisfiable(_)));
    }

    #[test]
    fn missing_vertex_fails() {
        let mut per_agent = HashMap::new();
        per_agent.insert("a1".to_string(), graph("a1", &["/phys"]));
        per_agent.insert("a2".to_string(), graph("a2", &["/phys"]));

        let spec = MergeSpec {
            root: "a1".to_string(),
            merge_ops: vec![MergeOp {
                base_agent: "a1".to_string(),
                appendant_agent: "a2".to_string(),
                kind: MergeOpKind::SameNode {
                    base_devpath: "/phys/NOPE".to_string(),
                    appendant_devpath: "/phys".to_string(),
                },
            }],
        };

        let err = merge_graphs(per_agent, &spec).unwrap_err();
        assert!(matches!(err, ConfigError::MergeVertexNotFound { .. }));
    }
}
