//! Per-component typed property cache. A `PropertyContainer` stores one
//! variant value per registered property name, stamped with the URI it was
//! scraped from and a per-property expiration time. The container itself
//! never refreshes anything; that's the `PropertyStore`'s job (`collector.rs`).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

/// The scalar value kinds a Redfish property can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Double(f64),
}

/// A concrete Rust type that can be stored as a `PropertyValue`.
pub trait PropertyScalar: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    fn to_variant(self) -> PropertyValue;
    fn from_variant(v: &PropertyValue) -> Option<Self>;
}

impl PropertyScalar for i64 {
    fn to_variant(self) -> PropertyValue {
        PropertyValue::Int(self)
    }
    fn from_variant(v: &PropertyValue) -> Option<Self> {
        match v {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl PropertyScalar for bool {
    fn to_variant(self) -> PropertyValue {
        PropertyValue::Bool(self)
    }
    fn from_variant(v: &PropertyValue) -> Option<Self> {
        match v {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl PropertyScalar for String {
    fn to_variant(self) -> PropertyValue {
        PropertyValue::Str(self)
    }
    fn from_variant(v: &PropertyValue) -> Option<Self> {
        match v {
            PropertyValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl PropertyScalar for f64 {
    fn to_variant(self) -> PropertyValue {
        PropertyValue::Double(self)
    }
    fn from_variant(v: &PropertyValue) -> Option<Self> {
        match v {
            PropertyValue::Double(d) => Some(*d),
            _ => None,
        }
    }
}

/// A named, typed Redfish property with a fixed cache duration. Implemented
/// by the unit structs in `property_definitions`.
pub trait PropertyDefinition {
    type Value: PropertyScalar;
    const NAME: &'static str;
    const CACHE_DURATION: Duration;
}

/// A value read back out of a `PropertyContainer`, with its cache metadata.
/// `PartialEq` is derived field-by-field; there is no hand-written `!=`
/// for this type to get wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    value: T,
    source_uri: String,
    expiration: Instant,
}

impl<T> CachedValue<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// A value is stale strictly after its expiration instant; equality at
    /// the boundary is still fresh.
    pub fn is_stale(&self, now: Instant) -> bool {
        now > self.expiration
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: PropertyValue,
    source_uri: String,
    expiration: Instant,
}

/// Per-component cache of typed properties, keyed by property name.
#[derive(Debug, Default)]
pub struct PropertyContainer {
    entries: HashMap<&'static str, StoredEntry>,
}

impl PropertyContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value`, stamping its expiration as `now + P::CACHE_DURATION`.
    pub fn set<P: PropertyDefinition>(&mut self, value: P::Value, source_uri: impl Into<String>, now: Instant) {
        self.entries.insert(
            P::NAME,
            StoredEntry {
                value: value.to_variant(),
                source_uri: source_uri.into(),
                expiration: now + P::CACHE_DURATION,
            },
        );
    }

    /// A pure read: `None` on miss or type mismatch, regardless of
    /// freshness. Callers that need the refresh-on-expiry behavior use
    /// `PropertyStore::get` instead.
    pub fn peek<P: PropertyDefinition>(&self) -> Option<CachedValue<P::Value>> {
        let entry = self.entries.get(P::NAME)?;
        let Some(value) = P::Value::from_variant(&entry.value) else {
            warn!(property = P::NAME, "type mismatch reading property");
            return None;
        };
        Some(CachedValue {
            value,
            source_uri: entry.source_uri.clone(),
            expiration: entry.expiration,
        })
    }

    pub fn source_uri_of(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.source_uri.as_str())
    }
}

/// A function that extracts one named property from a Redfish object into a
/// container, given the time of collection.
pub type ExtractFn = fn(&serde_json::Value, Option<&str>, &mut PropertyContainer, Instant);

fn extract_into_container<P: PropertyDefinition>(
    object: &serde_json::Value,
    uri: Option<&str>,
    container: &mut PropertyContainer,
    collection_time: Instant,
) where
    P::Value: TryFromJson,
{
    let Some(raw) = object.get(P::NAME) else {
        return;
    };
    let Some(value) = P::Value::try_from_json(raw) else {
        return;
    };
    if uri.is_none() {
        warn!(
            property = P::NAME,
            "collecting property from an object with no URI; it cannot be refreshed"
        );
    }
    container.set::<P>(value, uri.unwrap_or(""), collection_time);
}

/// Bridges `serde_json::Value` (the transport-agnostic representation of a
/// fetched Redfish object) to a `PropertyScalar`.
pub trait TryFromJson: Sized {
    fn try_from_json(v: &serde_json::Value) -> Option<Self>;
}

impl TryFromJson for i64 {
    fn try_from_json(v: &serde_json::Value) -> Option<Self> {
        v.as_i64()
    }
}

impl TryFromJson for bool {
    fn try_from_json(v: &serde_json::Value) -> Option<Self> {
        v.as_bool()
    }
}

impl TryFromJson for String {
    fn try_from_json(v: &serde_json::Value) -> Option<Self> {
        v.as_str().map(str::to_string)
    }
}

impl TryFromJson for f64 {
    fn try_from_json(v: &serde_json::Value) -> Option<Self> {
        v.as_f64()
    }
}

/// Maps property name to its extraction function, built once at startup.
#[derive(Default)]
pub struct PropertyRegistry {
    extract_fns: HashMap<&'static str, ExtractFn>,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self)
    where
        P: PropertyDefinition + 'static,
        P::Value: TryFromJson,
    {
        self.extract_fns.insert(P::NAME, extract_into_container::<P>);
    }

    /// Extracts every registered property from `object` into `container`.
    pub fn extract_all(
        &self,
        object: &serde_json::Value,
        uri: Option<&str>,
        collection_time: Instant,
        container: &mut PropertyContainer,
    ) {
        for extract in self.extract_fns.values() {
            extract(object, uri, container, collection_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redfish::property_definitions::{PropertyCapacityMib, PropertyName};

    #[test]
    fn set_then_peek_round_trips() {
        let mut c = PropertyContainer::new();
        let now = Instant::now();
        c.set::<PropertyCapacityMib>(1024, "/redfish/v1/Systems/1/Memory/1", now);
        let cached = c.peek::<PropertyCapacityMib>().unwrap();
        assert_eq!(*cached.value(), 1024);
        assert_eq!(cached.source_uri(), "/redfish/v1/Systems/1/Memory/1");
    }

    #[test]
    fn missing_property_is_none() {
        let c = PropertyContainer::new();
        assert!(c.peek::<PropertyCapacityMib>().is_none());
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let mut c = PropertyContainer::new();
        let now = Instant::now();
        c.set::<PropertyName>("dimm0".to_string(), "/x", now);
        let cached = c.peek::<PropertyName>().unwrap();
        assert!(!cached.is_stale(now + PropertyName::CACHE_DURATION));
        assert!(cached.is_stale(now + PropertyName::CACHE_DURATION + Duration::from_nanos(1)));
    }

    #[test]
    fn extract_all_uses_registered_functions() {
        let mut registry = PropertyRegistry::new();
        registry.register::<PropertyName>();
        registry.register::<PropertyCapacityMib>();

        let object = serde_json::json!({ "Name": "dimm0", "CapacityMiB": 8192 });
        let mut container = PropertyContainer::new();
        registry.extract_all(&object, Some("/uri"), Instant::now(), &mut container);

        assert_eq!(container.peek::<PropertyName>().unwrap().value(), "dimm0");
        assert_eq!(*container.peek::<PropertyCapacityMib>().unwrap().value(), 8192);
    }
}
