//! The generic per-agent resource collector interface (§4.7). Each agent's
//! backend-specific implementation exposes `Enumerate`/`Query` per resource
//! type behind this one trait, so the aggregator can fan requests out
//! without caring whether a given agent is Redfish-backed, a fixture, or
//! something else entirely.

use async_trait::async_trait;
use prost_types::FieldMask;
use tokio::sync::mpsc::UnboundedSender;

use crate::proto::mmaster::{
    AssemblyIdentifier, FirmwareIdentifier, OsDomainIdentifier, QueryAssemblyResponse,
    QueryFirmwareResponse, QueryOsDomainResponse, QuerySensorResponse, QueryStorageResponse,
    SensorIdentifier, StorageIdentifier,
};

/// A resource identifier message with a uniform "here are my devpath
/// fields" shape. Stands in for the source's `domain_differentiation<T>`
/// template specialization table: the aggregator dispatches on this trait
/// instead of on a type list known at compile time only in C++.
pub trait ResourceIdentifier {
    /// Mutable references to every devpath-valued field on this identifier.
    /// Every concrete identifier in this service carries exactly one, but
    /// the signature doesn't bake that arity in.
    fn devpath_fields_mut(&mut self) -> Vec<&mut String>;
    fn devpath_fields(&self) -> Vec<&String>;
}

impl ResourceIdentifier for OsDomainIdentifier {
    fn devpath_fields_mut(&mut self) -> Vec<&mut String> {
        Vec::new()
    }
    fn devpath_fields(&self) -> Vec<&String> {
        Vec::new()
    }
}

macro_rules! devpath_identifier {
    ($ty:ty) => {
        impl ResourceIdentifier for $ty {
            fn devpath_fields_mut(&mut self) -> Vec<&mut String> {
                vec![&mut self.devpath]
            }
            fn devpath_fields(&self) -> Vec<&String> {
                vec![&self.devpath]
            }
        }
    };
}

devpath_identifier!(FirmwareIdentifier);
devpath_identifier!(StorageIdentifier);
devpath_identifier!(AssemblyIdentifier);
devpath_identifier!(SensorIdentifier);

/// Per-agent collector of resource information. One implementation per
/// backend kind (Redfish today); the aggregator is generic over this trait
/// and never sees the concrete backend.
///
/// Enumeration is modeled as a channel of owned identifiers rather than a
/// reused response-template pointer plus callback: the source's signature
/// exists to dodge C++ overload-resolution quirks that don't apply here,
/// and a channel keeps no response buffer shared across call sites.
#[async_trait]
pub trait ResourceCollector: Send + Sync {
    /// The OS domain this agent belongs to. Used to answer `OsDomain`
    /// enumeration/routing without going through the devpath mapper.
    fn os_domain(&self) -> &str;

    async fn query_os_domain(&self, id: OsDomainIdentifier, field_mask: &FieldMask) -> QueryOsDomainResponse;

    async fn enumerate_firmware(&self, tx: UnboundedSender<FirmwareIdentifier>);
    async fn query_firmware(&self, id: FirmwareIdentifier, field_mask: &FieldMask) -> QueryFirmwareResponse;

    async fn enumerate_storage(&self, tx: UnboundedSender<StorageIdentifier>);
    async fn query_storage(&self, id: StorageIdentifier, field_mask: &FieldMask) -> QueryStorageResponse;

    async fn enumerate_assembly(&self, tx: UnboundedSender<AssemblyIdentifier>);
    async fn query_assembly(&self, id: AssemblyIdentifier, field_mask: &FieldMask) -> QueryAssemblyResponse;

    async fn enumerate_sensor(&self, tx: UnboundedSender<SensorIdentifier>);
    async fn query_sensor(&self, id: SensorIdentifier, field_mask: &FieldMask) -> QuerySensorResponse;
}

/// True when `field_mask` is empty (meaning "all fields") or names `field`.
/// Empty-means-everything matches the conventional proto FieldMask reading
/// and keeps every collector's "fill only the requested fields" logic in
/// one place.
pub fn field_requested(field_mask: &FieldMask, field: &str) -> bool {
    field_mask.paths.is_empty() || field_mask.paths.iter().any(|p| p == field)
}
