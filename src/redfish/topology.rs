//! Redfish topology discovery: crawls a fixed set of Assembly collection
//! paths, assigns local devpaths to the discovered components in
//! topological order, and reclassifies two-component cable assemblies.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::redfish::client::RedfishClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Board,
    Connector,
    Device,
    Cable,
}

/// One physical node discovered from a Redfish Assembly Component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub local_devpath: String,
    pub node_type: NodeType,
    pub associated_uris: Vec<String>,
}

/// The full set of nodes discovered from one agent's Redfish backend, plus
/// the indices needed for the lookups the property refresh path and
/// collector need.
#[derive(Debug, Default)]
pub struct NodeTopology {
    pub nodes: Vec<Node>,
    uri_to_node_indices: HashMap<String, Vec<usize>>,
    devpath_to_node_index: HashMap<String, usize>,
}

impl NodeTopology {
    /// Builds a topology directly from a node list, indexing it the same
    /// way `build_topology` would. Used by tests and by collectors that
    /// already have a node list from another source.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut devpath_to_node_index = HashMap::new();
        let mut uri_to_node_indices: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            devpath_to_node_index.insert(node.local_devpath.clone(), i);
            for uri in &node.associated_uris {
                uri_to_node_indices.entry(uri.clone()).or_default().push(i);
            }
        }
        NodeTopology {
            nodes,
            uri_to_node_indices,
            devpath_to_node_index,
        }
    }

    pub fn node_by_devpath(&self, devpath: &str) -> Option<&Node> {
        self.devpath_to_node_index.get(devpath).map(|&i| &self.nodes[i])
    }

    pub fn nodes_for_uri(&self, uri: &str) -> impl Iterator<Item = &Node> {
        self.uri_to_node_indices
            .get(uri)
            .into_iter()
            .flatten()
            .map(move |&i| &self.nodes[i])
    }

    pub fn devpaths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.local_devpath.as_str())
    }
}

struct Component {
    name: String,
    odata_id: String,
    node_type: NodeType,
    local_devpath: String,
    upstream_connector_sequence: String,
    associated_uris: Vec<String>,
}

struct Assembly {
    name: String,
    components: Vec<Component>,
    upstream_odata_id: Option<String>,
}

async fn fetch_ref(client: &dyn RedfishClient, value: &serde_json::Value) -> Option<serde_json::Value> {
    let uri = value.get("@odata.id")?.as_str()?;
    client.get(uri).await.ok().map(|o| o.body)
}

async fn fetch_collection_members(client: &dyn RedfishClient, obj: &serde_json::Value, key: &str) -> Vec<serde_json::Value> {
    let Some(collection_ref) = obj.get(key) else {
        return Vec::new();
    };
    let Some(collection) = fetch_ref(client, collection_ref).await else {
        return Vec::new();
    };
    let Some(members) = collection.get("Members").and_then(|m| m.as_array()) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(members.len());
    for member in members {
        if let Some(obj) = fetch_ref(client, member).await {
            out.push(obj);
        }
    }
    out
}

async fn fetch_assembly_payloads(client: &dyn RedfishClient, obj: &serde_json::Value) -> Vec<serde_json::Value> {
    let Some(assembly_ref) = obj.get("Assembly") else {
        return Vec::new();
    };
    let Some(assembly_obj) = fetch_ref(client, assembly_ref).await else {
        return Vec::new();
    };
    assembly_obj
        .get("Assemblies")
        .and_then(|a| a.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Walks chassis/assembly and systems/{memory|processors|ethernet|storage
/// drives}/assembly, per the fixed collection-path set this component owns.
pub async fn build_topology(client: &dyn RedfishClient) -> NodeTopology {
    let mut payloads = Vec::new();

    if let Ok(root) = client.get("/redfish/v1").await {
        for chassis in fetch_collection_members(client, &root.body, "Chassis").await {
            payloads.extend(fetch_assembly_payloads(client, &chassis).await);
        }
        for system in fetch_collection_members(client, &root.body, "Systems").await {
            payloads.extend(fetch_assembly_payloads(client, &system).await);

            for memory in fetch_collection_members(client, &system, "Memory").await {
                payloads.extend(fetch_assembly_payloads(client, &memory).await);
            }
            for processor in fetch_collection_members(client, &system, "Processors").await {
                payloads.extend(fetch_assembly_payloads(client, &processor).await);
            }
            for nic in fetch_collection_members(client, &system, "EthernetInterfaces").await {
                payloads.extend(fetch_assembly_payloads(client, &nic).await);
            }
            for storage in fetch_collection_members(client, &system, "Storage").await {
                for drive in fetch_collection_members(client, &storage, "Drives").await {
                    payloads.extend(fetch_assembly_payloads(client, &drive).await);
                }
            }
        }
    }

    let assemblies: Vec<Assembly> = payloads.iter().filter_map(|p| process_assembly(p)).collect();
    let assemblies = generate_devpaths(assemblies);
    build_node_topology(assemblies)
}

fn process_assembly(payload: &serde_json::Value) -> Option<Assembly> {
    let name = payload.get("Name")?.as_str()?.to_string();
    let mut assembly = Assembly {
        name: name.clone(),
        components: Vec::new(),
        upstream_odata_id: None,
    };

    let Some(google) = payload.get("Oem").and_then(|o| o.get("Google")) else {
        return Some(assembly);
    };

    if let Some(id) = google
        .get("AttachedTo")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|first| first.get("@odata.id"))
        .and_then(|v| v.as_str())
    {
        assembly.upstream_odata_id = Some(id.to_string());
    }

    let Some(components) = google.get("Components").and_then(|c| c.as_array()) else {
        return Some(assembly);
    };

    for c in components {
        let Some(odata_id) = c.get("@odata.id").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(cname) = c.get("Name").and_then(|v| v.as_str()) else {
            continue;
        };

        let node_type = if cname == name {
            NodeType::Board
        } else if c.get("PhysicalContext").and_then(|v| v.as_str()) == Some("Connector") {
            NodeType::Connector
        } else {
            NodeType::Device
        };

        let mut associated_uris = Vec::new();
        if let Some(list) = c.get("AssociatedWith").and_then(|v| v.as_array()) {
            for a in list {
                if let Some(uri) = a.get("@odata.id").and_then(|v| v.as_str()) {
                    associated_uris.push(uri.to_string());
                }
            }
        }

        assembly.components.push(Component {
            name: cname.to_string(),
            odata_id: odata_id.to_string(),
            node_type,
            local_devpath: String::new(),
            upstream_connector_sequence: String::new(),
            associated_uris,
        });
    }

    Some(assembly)
}

/// Assigns `local_devpath`/`upstream_connector_sequence` to every component
/// in topological order. An assembly whose upstream hasn't been processed
/// yet is deferred; if a pass makes no progress, the remaining (orphaned)
/// assemblies are dropped.
fn generate_devpaths(mut assemblies: Vec<Assembly>) -> Vec<Assembly> {
    let mut odata_to_info: HashMap<String, (String, String)> = HashMap::new();
    let mut processed = vec![false; assemblies.len()];

    loop {
        let mut progressed = false;
        for i in 0..assemblies.len() {
            if processed[i] {
                continue;
            }
            let upstream_seq = match &assemblies[i].upstream_odata_id {
                None => "/phys".to_string(),
                Some(upstream_id) => match odata_to_info.get(upstream_id) {
                    Some((seq, name)) => format!("{seq}/{name}"),
                    None => continue,
                },
            };

            for component in assemblies[i].components.iter_mut() {
                component.upstream_connector_sequence = upstream_seq.clone();
                component.local_devpath = match component.node_type {
                    NodeType::Board | NodeType::Cable => upstream_seq.clone(),
                    NodeType::Connector => format!("{upstream_seq}:connector:{}", component.name),
                    NodeType::Device => format!("{upstream_seq}:device:{}", component.name),
                };
            }
            for component in &assemblies[i].components {
                odata_to_info.insert(
                    component.odata_id.clone(),
                    (component.upstream_connector_sequence.clone(), component.name.clone()),
                );
            }
            processed[i] = true;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    assemblies
}

fn build_node_topology(assemblies: Vec<Assembly>) -> NodeTopology {
    let mut nodes = Vec::new();

    for assembly in &assemblies {
        if assembly.components.is_empty() {
            continue;
        }
        let start = nodes.len();
        for component in &assembly.components {
            nodes.push(Node {
                name: component.name.clone(),
                local_devpath: component.local_devpath.clone(),
                node_type: component.node_type,
                associated_uris: component.associated_uris.clone(),
            });
        }

        // A board whose assembly has exactly two components, one of which
        // is named DOWNLINK, is actually a cable.
        let slice = &mut nodes[start..];
        if slice.len() == 2 && slice.iter().any(|n| n.name == "DOWNLINK") {
            if let Some(primary) = slice.iter_mut().find(|n| n.name == assembly.name) {
                if primary.node_type == NodeType::Board {
                    primary.node_type = NodeType::Cable;
                }
            }
        }
    }

    let mut devpath_to_node_index = HashMap::new();
    let mut uri_to_node_indices: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        devpath_to_node_index.insert(node.local_devpath.clone(), i);
        for uri in &node.associated_uris {
            uri_to_node_indices.entry(uri.clone()).or_default().push(i);
        }
    }

    NodeTopology {
        nodes,
        uri_to_node_indices,
        devpath_to_node_index,
    }
}

/// Two topologies have the same nodes iff they contain the same
/// `(name, local_devpath, node_type)` triples, regardless of order. Used by
/// the snapshot updater to decide whether a rescrape actually changed
/// anything.
pub fn has_same_nodes(a: &NodeTopology, b: &NodeTopology) -> bool {
    if a.nodes.len() != b.nodes.len() {
        return false;
    }
    let a_keys: HashSet<(&str, &str, NodeType)> = a
        .nodes
        .iter()
        .map(|n| (n.name.as_str(), n.local_devpath.as_str(), n.node_type))
        .collect();
    b.nodes
        .iter()
        .all(|n| a_keys.contains(&(n.name.as_str(), n.local_devpath.as_str(), n.node_type)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redfish::client::FixtureRedfishClient;
    use serde_json::json;

    fn board_component(name: &str, odata_id: &str) -> serde_json::Value {
        json!({ "Name": name, "@odata.id": odata_id })
    }

    fn assembly_payload(name: &str, components: Vec<serde_json::Value>, attached_to: Option<&str>) -> serde_json::Value {
        let mut google = json!({ "Components": components });
        if let Some(uri) = attached_to {
            google["AttachedTo"] = json!([{ "@odata.id": uri }]);
        }
        json!({ "Name": name, "Oem": { "Google": google } })
    }

    fn fixture_with_root(assemblies_by_system: Vec<serde_json::Value>) -> FixtureRedfishClient {
        FixtureRedfishClient::new()
            .with("/redfish/v1", json!({ "Systems": { "@odata.id": "/redfish/v1/Systems" } }))
            .with("/redfish/v1/Systems", json!({ "Members": [{ "@odata.id": "/redfish/v1/Systems/1" }] }))
            .with(
                "/redfish/v1/Systems/1",
                json!({ "Assembly": { "@odata.id": "/redfish/v1/Systems/1/Assembly" } }),
            )
            .with(
                "/redfish/v1/Systems/1/Assembly",
                json!({ "Assemblies": assemblies_by_system }),
            )
    }

    #[tokio::test]
    async fn single_board_assembly() {
        let components = vec![board_component("MB", "/redfish/v1/Systems/1#/Oem/Google/Components/0")];
        let payload = assembly_payload("MB", components, None);
        let client = fixture_with_root(vec![payload]);

        let topology = build_topology(&client).await;
        assert_eq!(topology.nodes.len(), 1);
        assert_eq!(topology.nodes[0].local_devpath, "/phys");
        assert_eq!(topology.nodes[0].node_type, NodeType::Board);
    }

    #[tokio::test]
    async fn downstream_assembly_waits_for_upstream() {
        let board = board_component("MB", "/redfish/v1/Systems/1#/board");
        let root_payload = assembly_payload("MB", vec![board], None);

        let child_board = board_component("CHILD", "/redfish/v1/Systems/1#/child");
        let child_payload = assembly_payload("CHILD", vec![child_board], Some("/redfish/v1/Systems/1#/board"));

        // Child appears before its upstream in the input list; the
        // fixed-point pass must still resolve it.
        let client = fixture_with_root(vec![child_payload, root_payload]);
        let topology = build_topology(&client).await;

        assert_eq!(topology.node_by_devpath("/phys").unwrap().name, "MB");
        assert_eq!(topology.node_by_devpath("/phys/MB").unwrap().name, "CHILD");
    }

    #[tokio::test]
    async fn cable_reclassification() {
        let board = board_component("CABLE0", "/redfish/v1/Systems/1#/cable");
        let downlink = board_component("DOWNLINK", "/redfish/v1/Systems/1#/downlink");
        let payload = assembly_payload("CABLE0", vec![board, downlink], None);
        let client = fixture_with_root(vec![payload]);

        let topology = build_topology(&client).await;
        let cable = topology.node_by_devpath("/phys").unwrap();
        assert_eq!(cable.node_type, NodeType::Cable);
    }

    #[test]
    fn has_same_nodes_detects_changes() {
        let mut t1 = NodeTopology::default();
        t1.nodes.push(Node {
            name: "A".to_string(),
            local_devpath: "/phys".to_string(),
            node_type: NodeType::Board,
            associated_uris: vec![],
        });
        let t2 = NodeTopology {
            nodes: t1.nodes.clone(),
            ..NodeTopology::default()
        };
        assert!(has_same_nodes(&t1, &t2));

        t1.nodes.push(Node {
            name: "B".to_string(),
            local_devpath: "/phys/B".to_string(),
            node_type: NodeType::Device,
            associated_uris: vec![],
        });
        assert!(!has_same_nodes(&t1, &t2));
    }
}
