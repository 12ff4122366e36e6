use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::kernel::constants::{CAPABILITY_KEY, PROVIDER_ID_KEY, RANKING_KEY};
use crate::registry::{CapabilityValue, Properties, ProviderId};

/// Returned by [`register`](crate::registry::CapabilityRegistry::register);
/// identifies one publication for later withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationHandle {
    pub id: ProviderId,
    pub capability: String,
}

struct ProviderRecord {
    id: ProviderId,
    capability: String,
    properties: RwLock<Properties>,
    value: Mutex<Option<CapabilityValue>>,
    usage: AtomicUsize,
}

/// Shared handle onto one registered provider.
///
/// Clones refer to the same provider; equality and hashing use the id only.
/// The value stays reachable until the registry withdraws it.
#[derive(Clone)]
pub struct ProviderHandle(Arc<ProviderRecord>);

impl ProviderHandle {
    /// Build a handle for a new registration. The id and capability are
    /// written into the metadata so filters can match on them.
    pub fn new(
        id: ProviderId,
        capability: impl Into<String>,
        value: CapabilityValue,
        mut properties: Properties,
    ) -> Self {
        let capability = capability.into();
        properties.insert(PROVIDER_ID_KEY.to_string(), serde_json::Value::from(id));
        properties.insert(
            CAPABILITY_KEY.to_string(),
            serde_json::Value::from(capability.clone()),
        );
        Self(Arc::new(ProviderRecord {
            id,
            capability,
            properties: RwLock::new(properties),
            value: Mutex::new(Some(value)),
            usage: AtomicUsize::new(0),
        }))
    }

    pub fn id(&self) -> ProviderId {
        self.0.id
    }

    pub fn capability(&self) -> &str {
        &self.0.capability
    }

    /// Snapshot of the provider metadata
    pub fn properties(&self) -> Properties {
        self.0
            .properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn property(&self, key: &str) -> Option<serde_json::Value> {
        self.0
            .properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// `service.ranking` as an integer, 0 when absent or not numeric
    pub fn ranking(&self) -> i64 {
        self.property(RANKING_KEY)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    /// The published value, or `None` once the provider has been withdrawn
    pub fn value(&self) -> Option<CapabilityValue> {
        self.0
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch the value and count one more user of it.
    pub fn acquire(&self) -> Option<CapabilityValue> {
        let value = self.value();
        if value.is_some() {
            self.0.usage.fetch_add(1, Ordering::SeqCst);
        }
        value
    }

    /// Give back a value obtained through [`acquire`](Self::acquire).
    pub fn release(&self) {
        let _ = self
            .0
            .usage
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn usage_count(&self) -> usize {
        self.0.usage.load(Ordering::SeqCst)
    }

    pub fn is_available(&self) -> bool {
        self.0
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the value from the handle. Called by registry implementations
    /// after `removing` has been delivered.
    pub fn withdraw(&self) -> Option<CapabilityValue> {
        self.0
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Replace the metadata, keeping the id and capability keys intact.
    pub fn replace_properties(&self, mut properties: Properties) {
        properties.insert(PROVIDER_ID_KEY.to_string(), serde_json::Value::from(self.0.id));
        properties.insert(
            CAPABILITY_KEY.to_string(),
            serde_json::Value::from(self.0.capability.clone()),
        );
        *self
            .0
            .properties
            .write()
            .unwrap_or_else(PoisonError::into_inner) = properties;
    }
}

impl PartialEq for ProviderHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ProviderHandle {}

impl Hash for ProviderHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

// Manual Debug implementation, the value is opaque
impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("id", &self.0.id)
            .field("capability", &self.0.capability)
            .field("available", &self.is_available())
            .field("usage", &self.usage_count())
            .finish()
    }
}
