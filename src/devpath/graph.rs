//! The per-agent and machine-wide topology graph: vertices are plugins,
//! edges are parent-to-child containment. Implemented on top of `petgraph`'s
//! dense-index `DiGraph`, per the design notes' call for "a minimal DAG with
//! adjacency sets keyed by dense integer vertex handles."

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// One agent's view of a local devpath: which agent reported it, and what
/// the devpath looked like in that agent's own domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPair {
    pub agent: String,
    pub local_devpath: String,
}

/// A physical plugin. `global_devpath` is empty until the vertex has been
/// placed by a merge (or, for a single-agent graph pre-merge, by the
/// generator using the local devpath as a provisional global one).
#[derive(Debug, Clone, Default)]
pub struct Vertex {
    pub global_devpath: String,
    pub local_pairs: Vec<LocalPair>,
}

impl Vertex {
    pub fn new(global_devpath: impl Into<String>, agent: impl Into<String>, local_devpath: impl Into<String>) -> Self {
        Vertex {
            global_devpath: global_devpath.into(),
            local_pairs: vec![LocalPair {
                agent: agent.into(),
                local_devpath: local_devpath.into(),
            }],
        }
    }

    pub fn has_local_pair(&self, agent: &str, local_devpath: &str) -> bool {
        self.local_pairs
            .iter()
            .any(|p| p.agent == agent && p.local_devpath == local_devpath)
    }
}

pub type TopologyGraph = DiGraph<Vertex, ()>;
pub type VertexId = NodeIndex;

/// Finds the vertex in `g` that carries the local pair `(agent, local_devpath)`.
pub fn find_vertex(g: &TopologyGraph, agent: &str, local_devpath: &str) -> Option<VertexId> {
    g.node_indices()
        .find(|&ix| g[ix].has_local_pair(agent, local_devpath))
}

/// Finds the unique vertex in `g` whose `global_devpath` equals `devpath`.
pub fn find_vertex_by_global(g: &TopologyGraph, devpath: &str) -> Option<VertexId> {
    g.node_indices().find(|&ix| g[ix].global_devpath == devpath)
}

pub fn has_cycle(g: &TopologyGraph) -> bool {
    petgraph::algo::is_cyclic_directed(g)
}

/// Returns the single parent of `v`, if any. Per the data model every
/// non-root vertex has exactly one parent.
pub fn parent_of(g: &TopologyGraph, v: VertexId) -> Option<VertexId> {
    g.edges_directed(v, Direction::Incoming)
        .next()
        .map(|e| e.source())
}

/// Breadth-first iteration of vertices reachable from `root` along outgoing
/// edges, visiting `root` itself first.
pub fn bfs_from(g: &TopologyGraph, root: VertexId) -> Vec<VertexId> {
    let mut order = Vec::new();
    let mut queue = std::collections::VecDeque::from([root]);
    let mut seen = std::collections::HashSet::from([root]);
    while let Some(v) = queue.pop_front() {
        order.push(v);
        for e in g.edges_directed(v, Direction::Outgoing) {
            let t = e.target();
            if seen.insert(t) {
                queue.push_back(t);
            }
        }
    }
    order
}
