//! The Redfish-backed `ResourceCollector`: assembly enumeration walks the
//! crawled topology directly; every `Query` resolves by devpath lookup
//! followed by property extraction through the `PropertyStore`'s
//! refresh-on-expiry cache, filtered down to the requested field mask.
//!
//! Firmware is not modeled by this port's topology crawl (it only walks
//! the Assembly collection paths named in §4.6, not a firmware inventory
//! collection), so `query_firmware` always reports `NOT_FOUND` and
//! `enumerate_firmware` yields nothing. Recorded in DESIGN.md.

use async_trait::async_trait;
use prost_types::FieldMask;
use tokio::sync::{mpsc::UnboundedSender, Mutex};

use crate::collector::{field_requested, ResourceCollector};
use crate::devpath::SnapshotUpdater;
use crate::proto::mmaster::{
    AssemblyIdentifier, FirmwareIdentifier, OsDomainIdentifier, QueryAssemblyResponse,
    QueryFirmwareResponse, QueryOsDomainResponse, QuerySensorResponse, QueryStorageResponse,
    SensorIdentifier, Status, StatusCode, StorageIdentifier,
};
use crate::redfish::client::RedfishClient;
use crate::redfish::property_definitions::{
    PropertyCapacityBytes, PropertyMediaType, PropertyName, PropertyReadingCelsius, PropertyUpperThresholdCritical,
};
use crate::redfish::store::PropertyStore;
use crate::redfish::topology::{build_topology, has_same_nodes};

fn ok_status() -> Status {
    Status {
        code: StatusCode::Ok as i32,
        message: String::new(),
    }
}

fn not_found_status() -> Status {
    Status {
        code: StatusCode::NotFound as i32,
        message: String::new(),
    }
}

/// A `ResourceCollector` backed by one agent's crawled Redfish topology and
/// property cache. `os_type` has no Redfish-native source in this port's
/// scope; it is supplied at construction time (see DESIGN.md).
pub struct RedfishResourceCollector {
    os_domain: String,
    os_type: String,
    store: Mutex<PropertyStore>,
}

impl RedfishResourceCollector {
    pub fn new(os_domain: impl Into<String>, os_type: impl Into<String>, store: PropertyStore) -> Self {
        RedfishResourceCollector {
            os_domain: os_domain.into(),
            os_type: os_type.into(),
            store: Mutex::new(store),
        }
    }

    /// Re-crawls `client`'s topology and, if it differs from what's
    /// currently cached (per `has_same_nodes`), swaps it in and reports the
    /// fresh plugin devpath list — the shape a `SnapshotUpdater::poll`
    /// expects. Returns `None` when nothing changed, leaving the cached
    /// topology (and its properties) untouched.
    pub async fn rescrape(&self, client: &dyn RedfishClient) -> Option<Vec<String>> {
        let new_topology = build_topology(client).await;
        let mut store = self.store.lock().await;
        if has_same_nodes(&new_topology, store.topology()) {
            return None;
        }
        let plugins: Vec<String> = new_topology.devpaths().map(str::to_string).collect();
        store.replace_topology(new_topology);
        Some(plugins)
    }
}

#[async_trait]
impl ResourceCollector for RedfishResourceCollector {
    fn os_domain(&self) -> &str {
        &self.os_domain
    }

    async fn query_os_domain(&self, _id: OsDomainIdentifier, _field_mask: &FieldMask) -> QueryOsDomainResponse {
        QueryOsDomainResponse {
            id: None,
            status: Some(ok_status()),
            os_type: self.os_type.clone(),
        }
    }

    async fn enumerate_firmware(&self, _tx: UnboundedSender<FirmwareIdentifier>) {}

    async fn query_firmware(&self, _id: FirmwareIdentifier, _field_mask: &FieldMask) -> QueryFirmwareResponse {
        QueryFirmwareResponse {
            id: None,
            status: Some(not_found_status()),
            version: String::new(),
        }
    }

    async fn enumerate_storage(&self, tx: UnboundedSender<StorageIdentifier>) {
        let store = self.store.lock().await;
        for devpath in store.topology().devpaths() {
            let _ = tx.send(StorageIdentifier { devpath: devpath.to_string() });
        }
    }

    async fn query_storage(&self, id: StorageIdentifier, field_mask: &FieldMask) -> QueryStorageResponse {
        let mut store = self.store.lock().await;
        if store.topology().node_by_devpath(&id.devpath).is_none() {
            return QueryStorageResponse {
                id: None,
                status: Some(not_found_status()),
                capacity_bytes: 0,
                media_type: String::new(),
            };
        }

        let capacity_requested = field_requested(field_mask, "capacity_bytes");
        let capacity_bytes = if capacity_requested {
            store.get::<PropertyCapacityBytes>(&id.devpath).await
        } else {
            None
        };
        let media_requested = field_requested(field_mask, "media_type");
        let media_type = if media_requested {
            store.get::<PropertyMediaType>(&id.devpath).await
        } else {
            None
        };

        if (capacity_requested && capacity_bytes.is_none()) || (media_requested && media_type.is_none()) {
            return QueryStorageResponse {
                id: None,
                status: Some(not_found_status()),
                capacity_bytes: 0,
                media_type: String::new(),
            };
        }

        QueryStorageResponse {
            id: None,
            status: Some(ok_status()),
            capacity_bytes: capacity_bytes.unwrap_or_default(),
            media_type: media_type.unwrap_or_default(),
        }
    }

    async fn enumerate_assembly(&self, tx: UnboundedSender<AssemblyIdentifier>) {
        let store = self.store.lock().await;
        for devpath in store.topology().devpaths() {
            let _ = tx.send(AssemblyIdentifier { devpath: devpath.to_string() });
        }
    }

    async fn query_assembly(&self, id: AssemblyIdentifier, field_mask: &FieldMask) -> QueryAssemblyResponse {
        let mut store = self.store.lock().await;
        if store.topology().node_by_devpath(&id.devpath).is_none() {
            return QueryAssemblyResponse {
                id: None,
                status: Some(not_found_status()),
                name: String::new(),
            };
        }

        let name_requested = field_requested(field_mask, "name");
        let name = if name_requested {
            store.get::<PropertyName>(&id.devpath).await
        } else {
            None
        };

        if name_requested && name.is_none() {
            return QueryAssemblyResponse {
                id: None,
                status: Some(not_found_status()),
                name: String::new(),
            };
        }

        QueryAssemblyResponse {
            id: None,
            status: Some(ok_status()),
            name: name.unwrap_or_default(),
        }
    }

    async fn enumerate_sensor(&self, tx: UnboundedSender<SensorIdentifier>) {
        let store = self.store.lock().await;
        for devpath in store.topology().devpaths() {
            let _ = tx.send(SensorIdentifier { devpath: devpath.to_string() });
        }
    }

    async fn query_sensor(&self, id: SensorIdentifier, field_mask: &FieldMask) -> QuerySensorResponse {
        let mut store = self.store.lock().await;
        if store.topology().node_by_devpath(&id.devpath).is_none() {
            return QuerySensorResponse {
                id: None,
                status: Some(not_found_status()),
                reading_celsius: 0,
                upper_threshold_critical: 0,
            };
        }

        let reading_requested = field_requested(field_mask, "reading_celsius");
        let reading = if reading_requested {
            store.get::<PropertyReadingCelsius>(&id.devpath).await
        } else {
            None
        };
        let threshold_requested = field_requested(field_mask, "upper_threshold_critical");
        let threshold = if threshold_requested {
            store.get::<PropertyUpperThresholdCritical>(&id.devpath).await
        } else {
            None
        };

        if (reading_requested && reading.is_none()) || (threshold_requested && threshold.is_none()) {
            return QuerySensorResponse {
                id: None,
                status: Some(not_found_status()),
                reading_celsius: 0,
                upper_threshold_critical: 0,
            };
        }

        QuerySensorResponse {
            id: None,
            status: Some(ok_status()),
            reading_celsius: reading.unwrap_or_default() as i32,
            upper_threshold_critical: threshold.unwrap_or_default() as i32,
        }
    }
}

/// Bridges a periodic async Redfish rescrape to the devpath mapper's
/// synchronous `SnapshotUpdater::poll`. The rescrape task calls
/// `report_change` whenever `RedfishResourceCollector::rescrape` finds a
/// changed topology; `poll` (called from the mapper's rebuild loop) drains
/// whatever's pending without ever touching the network itself.
#[derive(Default)]
pub struct RedfishSnapshotUpdater {
    pending: std::sync::Mutex<Option<Vec<String>>>,
}

impl RedfishSnapshotUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_change(&self, plugins: Vec<String>) {
        *self.pending.lock().unwrap() = Some(plugins);
    }
}

impl SnapshotUpdater for RedfishSnapshotUpdater {
    fn poll(&self) -> Option<Vec<String>> {
        self.pending.lock().unwrap().take()
    }
}

/// Lets an `Arc<RedfishSnapshotUpdater>` itself be boxed into an
/// `AgentEntry`, so the periodic rescrape task can keep its own clone of
/// the same instance to call `report_change` on.
impl SnapshotUpdater for std::sync::Arc<RedfishSnapshotUpdater> {
    fn poll(&self) -> Option<Vec<String>> {
        self.as_ref().poll()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::redfish::client::FixtureRedfishClient;
    use crate::redfish::property::PropertyRegistry;
    use crate::redfish::topology::{Node, NodeTopology, NodeType};
    use prost_types::FieldMask;
    use serde_json::json;
    use std::sync::Arc;

    fn topology_with_board() -> NodeTopology {
        NodeTopology::from_nodes(vec![Node {
            name: "MB".to_string(),
            local_devpath: "/phys".to_string(),
            node_type: NodeType::Board,
            associated_uris: vec!["/redfish/v1/Chassis/1".to_string()],
        }])
    }

    fn registry() -> PropertyRegistry {
        let mut registry = PropertyRegistry::new();
        registry.register::<PropertyName>();
        registry
    }

    #[tokio::test]
    async fn query_assembly_returns_cached_name() {
        let client = Arc::new(FixtureRedfishClient::new().with("/redfish/v1/Chassis/1", json!({ "Name": "MB" })));
        let clock = Arc::new(FakeClock::new());
        let mut store = PropertyStore::new(registry(), client, clock, topology_with_board());
        store.refresh("/redfish/v1/Chassis/1").await;
        let collector = RedfishResourceCollector::new("dom0", "linux", store);

        let response = collector
            .query_assembly(AssemblyIdentifier { devpath: "/phys".to_string() }, &FieldMask::default())
            .await;
        assert_eq!(response.status.unwrap().code, StatusCode::Ok as i32);
        assert_eq!(response.name, "MB");
    }

    #[tokio::test]
    async fn query_assembly_missing_devpath_is_not_found() {
        let client = Arc::new(FixtureRedfishClient::new());
        let clock = Arc::new(FakeClock::new());
        let store = PropertyStore::new(registry(), client, clock, topology_with_board());
        let collector = RedfishResourceCollector::new("dom0", "linux", store);

        let response = collector
            .query_assembly(AssemblyIdentifier { devpath: "/phys/MISSING".to_string() }, &FieldMask::default())
            .await;
        assert_eq!(response.status.unwrap().code, StatusCode::NotFound as i32);
    }

    #[tokio::test]
    async fn enumerate_assembly_yields_every_devpath() {
        let client = Arc::new(FixtureRedfishClient::new());
        let clock = Arc::new(FakeClock::new());
        let store = PropertyStore::new(registry(), client, clock, topology_with_board());
        let collector = RedfishResourceCollector::new("dom0", "linux", store);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        collector.enumerate_assembly(tx).await;
        let mut seen = Vec::new();
        while let Some(id) = rx.recv().await {
            seen.push(id.devpath);
        }
        assert_eq!(seen, vec!["/phys".to_string()]);
    }

    fn board_component(name: &str, odata_id: &str) -> serde_json::Value {
        json!({ "Name": name, "@odata.id": odata_id })
    }

    fn single_board_fixture(board_name: &str) -> FixtureRedfishClient {
        let components = vec![board_component(board_name, "/redfish/v1/Systems/1#/board")];
        let payload = json!({ "Name": board_name, "Oem": { "Google": { "Components": components } } });
        FixtureRedfishClient::new()
            .with("/redfish/v1", json!({ "Systems": { "@odata.id": "/redfish/v1/Systems" } }))
            .with("/redfish/v1/Systems", json!({ "Members": [{ "@odata.id": "/redfish/v1/Systems/1" }] }))
            .with(
                "/redfish/v1/Systems/1",
                json!({ "Assembly": { "@odata.id": "/redfish/v1/Systems/1/Assembly" } }),
            )
            .with("/redfish/v1/Systems/1/Assembly", json!({ "Assemblies": [payload] }))
    }

    #[tokio::test]
    async fn rescrape_reports_changed_topology_and_swaps_it_in() {
        let initial_client = Arc::new(single_board_fixture("MB"));
        let clock = Arc::new(FakeClock::new());
        let initial_topology = build_topology(initial_client.as_ref()).await;
        let store = PropertyStore::new(registry(), initial_client, clock, initial_topology);
        let collector = RedfishResourceCollector::new("dom0", "linux", store);

        let renamed_client = single_board_fixture("MB2");
        let plugins = collector.rescrape(&renamed_client).await.expect("topology changed");
        assert_eq!(plugins, vec!["/phys".to_string()]);

        let response = collector
            .query_assembly(AssemblyIdentifier { devpath: "/phys".to_string() }, &FieldMask::default())
            .await;
        assert_eq!(response.status.unwrap().code, StatusCode::NotFound as i32);
    }

    #[tokio::test]
    async fn rescrape_returns_none_when_topology_is_unchanged() {
        let initial_client = Arc::new(single_board_fixture("MB"));
        let clock = Arc::new(FakeClock::new());
        let initial_topology = build_topology(initial_client.as_ref()).await;
        let store = PropertyStore::new(registry(), initial_client, clock, initial_topology);
        let collector = RedfishResourceCollector::new("dom0", "linux", store);

        let same_client = single_board_fixture("MB");
        assert!(collector.rescrape(&same_client).await.is_none());
    }

    #[test]
    fn snapshot_updater_report_change_then_poll_drains_exactly_once() {
        let updater = RedfishSnapshotUpdater::new();
        assert!(updater.poll().is_none());

        updater.report_change(vec!["/phys".to_string()]);
        assert_eq!(updater.poll(), Some(vec!["/phys".to_string()]));
        assert!(updater.poll().is_none());
    }
}
