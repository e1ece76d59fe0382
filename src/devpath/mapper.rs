//! Devpath mapper: the snapshot-based, lock-free-read translation layer
//! between machine-global devpaths and per-agent local devpaths.
//!
//! Readers take a local `Arc` to the current snapshot via [`ArcSwap::load`]
//! and never block a concurrent rebuild; the rebuilder constructs the
//! entire new snapshot before publishing it with a single atomic store.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use arc_swap::ArcSwap;

use crate::devpath::generator::generate_graph;
use crate::devpath::graph::{find_vertex, find_vertex_by_global, TopologyGraph};
use crate::devpath::inverter::{invert_graph, InvertOp};
use crate::devpath::merger::{merge_graphs, MergeSpec};
use crate::devpath::vocab::{devpath_components, join_devpath};
use crate::error::ConfigError;

/// Per-agent hook that refreshes the agent's reported plugin list. Invoked
/// at most once per rebuild; implementations need not be thread-safe since
/// rebuilds are serialized by the caller.
pub trait SnapshotUpdater: Send + Sync {
    /// Returns the agent's current plugin devpaths if they have changed
    /// since the last call, `None` if nothing changed.
    fn poll(&self) -> Option<Vec<String>>;
}

/// A `SnapshotUpdater` that never reports a change, for agents whose
/// topology never needs to be discovered dynamically (e.g. in tests).
pub struct StaticUpdater;

impl SnapshotUpdater for StaticUpdater {
    fn poll(&self) -> Option<Vec<String>> {
        None
    }
}

pub struct AgentEntry {
    pub name: String,
    pub os_domain: String,
    pub fallback_plugins: Vec<String>,
    pub updater: Box<dyn SnapshotUpdater>,
    current_plugins: Mutex<Vec<String>>,
}

impl AgentEntry {
    pub fn new(
        name: impl Into<String>,
        os_domain: impl Into<String>,
        fallback_plugins: Vec<String>,
        updater: Box<dyn SnapshotUpdater>,
    ) -> Self {
        AgentEntry {
            name: name.into(),
            os_domain: os_domain.into(),
            fallback_plugins,
            updater,
            current_plugins: Mutex::new(Vec::new()),
        }
    }
}

struct GraphSnapshot {
    root_graph: TopologyGraph,
}

/// The full configuration a `GraphDevpathMapper` is built from.
pub struct MapperConfig {
    pub agents: Vec<AgentEntry>,
    pub invert_ops: Vec<InvertOp>,
    pub merge_spec: MergeSpec,
}

pub struct GraphDevpathMapper {
    agents: Vec<AgentEntry>,
    invert_ops: Vec<InvertOp>,
    merge_spec: MergeSpec,
    snapshot: ArcSwap<GraphSnapshot>,
}

impl GraphDevpathMapper {
    /// Builds a mapper and performs the first snapshot build.
    pub fn new(config: MapperConfig) -> Result<Self, ConfigError> {
        let mapper = GraphDevpathMapper {
            agents: config.agents,
            invert_ops: config.invert_ops,
            merge_spec: config.merge_spec,
            snapshot: ArcSwap::from_pointee(GraphSnapshot {
                root_graph: TopologyGraph::new(),
            }),
        };
        mapper.rebuild(true)?;
        Ok(mapper)
    }

    /// Polls every agent's snapshot updater and, if any reported a change
    /// (or `force` is set, as on first build), rebuilds and publishes a new
    /// snapshot. Returns whether a rebuild happened.
    pub fn rebuild(&self, force: bool) -> Result<bool, ConfigError> {
        let mut changed = force;
        for agent in &self.agents {
            if let Some(new_list) = agent.updater.poll() {
                *agent.current_plugins.lock().unwrap() = new_list;
                changed = true;
            }
        }
        if !changed {
            return Ok(false);
        }

        let mut per_agent: HashMap<String, TopologyGraph> = HashMap::new();
        for agent in &self.agents {
            let current = agent.current_plugins.lock().unwrap();
            let plugins: Vec<String> = if current.is_empty() {
                agent.fallback_plugins.clone()
            } else {
                current.clone()
            };
            drop(current);

            let mut graph = generate_graph(&agent.name, &plugins)
                .map_err(|e| ConfigError::GraphBuildFailed(format!("{}: {e}", agent.name)))?;

            for op in self.invert_ops.iter().filter(|op| op.agent == agent.name) {
                invert_graph(&mut graph, op)?;
            }

            per_agent.insert(agent.name.clone(), graph);
        }

        let root_graph = merge_graphs(per_agent, &self.merge_spec)?;
        self.snapshot.store(std::sync::Arc::new(GraphSnapshot { root_graph }));
        Ok(true)
    }

    /// Translates `devpath` (local to `domain`) into its machine-global
    /// form. Returns `None` on invalid input or lookup miss, never an error:
    /// invalid-devpath never escapes this boundary (§7).
    pub fn domain_devpath_to_machine(&self, domain: &str, devpath: &str) -> Option<String> {
        let components = devpath_components(devpath).ok()?;
        let snapshot = self.snapshot.load();
        let vertex = find_vertex(&snapshot.root_graph, domain, &components.path)?;
        let global = &snapshot.root_graph[vertex].global_devpath;
        Some(join_devpath(global, components.ns, components.text.as_deref()))
    }

    /// Translates a machine-global `devpath` into `domain`'s local form.
    pub fn machine_devpath_to_domain(&self, domain: &str, devpath: &str) -> Option<String> {
        let components = devpath_components(devpath).ok()?;
        let snapshot = self.snapshot.load();
        let vertex = find_vertex_by_global(&snapshot.root_graph, &components.path)?;
        let local_pair = snapshot.root_graph[vertex]
            .local_pairs
            .iter()
            .find(|p| p.agent == domain)?;
        Some(join_devpath(
            &local_pair.local_devpath,
            components.ns,
            components.text.as_deref(),
        ))
    }

    /// Returns the set of distinct agents that see the plugin at machine
    /// devpath `devpath`. Empty if `devpath` is invalid or unknown.
    pub fn machine_devpath_to_domains(&self, devpath: &str) -> HashSet<String> {
        let Ok(components) = devpath_components(devpath) else {
            return HashSet::new();
        };
        let snapshot = self.snapshot.load();
        match find_vertex_by_global(&snapshot.root_graph, &components.path) {
            Some(vertex) => snapshot.root_graph[vertex]
                .local_pairs
                .iter()
                .map(|p| p.agent.clone())
                .collect(),
            None => HashSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, fallback: &[&str]) -> AgentEntry {
        AgentEntry::new(
            name,
            name,
            fallback.iter().map(|s| s.to_string()).collect(),
            Box::new(StaticUpdater),
        )
    }

    fn linear_merge_spec() -> MergeSpec {
        use crate::devpath::merger::{MergeOp, MergeOpKind};
        MergeSpec {
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
        }
    }

    fn build_mapper() -> GraphDevpathMapper {
        let agents = vec![
            entry("a1", &["/phys", "/phys/A", "/phys/A/B"]),
            entry("a2", &["/phys", "/phys/C", "/phys/C/D"]),
            entry("a3", &["/phys", "/phys/E", "/phys/E/F"]),
            entry("a4", &["/phys", "/phys/G", "/phys/G/H"]),
        ];
        GraphDevpathMapper::new(MapperConfig {
            agents,
            invert_ops: vec![],
            merge_spec: linear_merge_spec(),
        })
        .unwrap()
    }

    #[test]
    fn linear_merge_translation() {
        let mapper = build_mapper();
        assert_eq!(
            mapper.domain_devpath_to_machine("a4", "/phys/G/H"),
            Some("/phys/A/B/PADS1/C/PADS2/G/H".to_string())
        );
        let domains = mapper.machine_devpath_to_domains("/phys/A/B");
        assert_eq!(domains, HashSet::from(["a1".to_string(), "a3".to_string()]));
    }

    #[test]
    fn round_trip_translation() {
        let mapper = build_mapper();
        let machine = mapper.domain_devpath_to_machine("a2", "/phys/C/D").unwrap();
        let back = mapper.machine_devpath_to_domain("a2", &machine).unwrap();
        assert_eq!(back, "/phys/C/D");
    }

    #[test]
    fn invalid_devpath_is_none() {
        let mapper = build_mapper();
        assert_eq!(mapper.domain_devpath_to_machine("a1", "not-a-devpath"), None);
        assert_eq!(mapper.machine_devpath_to_domains("not-a-devpath"), HashSet::new());
    }

    #[test]
    fn agent_outage_falls_back_to_configured_plugins() {
        struct EmptyUpdater;
        impl SnapshotUpdater for EmptyUpdater {
            fn poll(&self) -> Option<Vec<String>> {
                Some(Vec::new())
            }
        }

        let agents = vec![
            AgentEntry::new(
                "a1",
                "a1",
                vec!["/phys".to_string(), "/phys/A".to_string(), "/phys/A/B".to_string()],
                Box::new(EmptyUpdater),
            ),
            entry("a2", &["/phys", "/phys/C", "/phys/C/D"]),
            entry("a3", &["/phys", "/phys/E", "/phys/E/F"]),
            entry("a4", &["/phys", "/phys/G", "/phys/G/H"]),
        ];
        let mapper = GraphDevpathMapper::new(MapperConfig {
            agents,
            invert_ops: vec![],
            merge_spec: linear_merge_spec(),
        })
        .unwrap();

        assert_eq!(
            mapper.domain_devpath_to_machine("a4", "/phys/G/H"),
            Some("/phys/A/B/PADS1/C/PADS2/G/H".to_string())
        );
    }
}
