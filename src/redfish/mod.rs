//! The Redfish-backed resource collector: topology discovery, typed
//! property extraction, and the per-property cache with refresh-on-expiry.

pub mod client;
pub mod collector;
pub mod property;
pub mod property_definitions;
pub mod store;
pub mod topology;

pub use client::{FixtureRedfishClient, HttpRedfishClient, RedfishClient, RedfishObject};
pub use collector::RedfishResourceCollector;
pub use store::PropertyStore;
pub use topology::{build_topology, has_same_nodes, Node, NodeTopology, NodeType};
