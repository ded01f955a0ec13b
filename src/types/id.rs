// ABOUTME: Phantom-typed identifiers for externally created resources.
// ABOUTME: Keeps hosting app UUIDs, DNS record, zone, and monitor IDs from being mixed up.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for the phantom parameter. Empty enums cannot be instantiated.
pub enum AppMarker {}
pub enum DnsRecordMarker {}
pub enum ZoneMarker {}
pub enum MonitorMarker {}

/// An identifier handed out by an external platform.
///
/// The phantom parameter means a `DnsRecordId` can't be passed where an
/// `AppUuid` is expected, even though both are strings on the wire.
///
/// ```compile_fail
/// use fabrik::types::{AppUuid, DnsRecordId};
///
/// fn delete_app(_uuid: AppUuid) {}
///
/// delete_app(DnsRecordId::new("rec-1"));
/// ```
#[must_use = "IDs reference external resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// T is only a marker, so these impls must not require T: Trait.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

pub type AppUuid = Id<AppMarker>;
pub type DnsRecordId = Id<DnsRecordMarker>;
pub type ZoneId = Id<ZoneMarker>;
pub type MonitorId = Id<MonitorMarker>;
