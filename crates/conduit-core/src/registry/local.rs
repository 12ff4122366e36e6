use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace};

use crate::kernel::error::Result;
use crate::registry::error::RegistryError;
use crate::registry::{
    CapabilityListener, CapabilityRegistry, CapabilityValue, Filter, ListenerId, Properties,
    ProviderHandle, ProviderId, RegistrationHandle,
};

struct ListenerEntry {
    capability: String,
    filter: Filter,
    listener: Arc<dyn CapabilityListener>,
}

impl ListenerEntry {
    fn interested_in(&self, provider: &ProviderHandle, properties: &Properties) -> bool {
        self.capability == provider.capability() && self.filter.matches(properties)
    }
}

#[derive(Default)]
struct RegistryState {
    providers: BTreeMap<ProviderId, ProviderHandle>,
    listeners: BTreeMap<ListenerId, ListenerEntry>,
}

/// In-process capability registry.
///
/// State lives behind an `RwLock`; listener callbacks are never invoked while
/// that lock is held. A separate delivery lock serializes mutations together
/// with their notifications, so every listener observes events in the order
/// the registry applied them.
pub struct LocalCapabilityRegistry {
    state: RwLock<RegistryState>,
    delivery: Mutex<()>,
    next_provider_id: AtomicU64,
    next_listener_id: AtomicU64,
}

impl LocalCapabilityRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            delivery: Mutex::new(()),
            next_provider_id: AtomicU64::new(1),
            next_listener_id: AtomicU64::new(1),
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|_| RegistryError::Poisoned { what: "state" }.into())
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|_| RegistryError::Poisoned { what: "state" }.into())
    }

    fn lock_delivery(&self) -> Result<MutexGuard<'_, ()>> {
        self.delivery
            .lock()
            .map_err(|_| RegistryError::Poisoned { what: "delivery" }.into())
    }

    fn interested_listeners(
        state: &RegistryState,
        provider: &ProviderHandle,
        properties: &Properties,
    ) -> Vec<Arc<dyn CapabilityListener>> {
        state
            .listeners
            .values()
            .filter(|entry| entry.interested_in(provider, properties))
            .map(|entry| entry.listener.clone())
            .collect()
    }

    /// Replace a provider's metadata.
    ///
    /// Listeners that matched before and after receive `modified`; listeners
    /// that only match now receive `added`; listeners that stop matching
    /// receive `removing`.
    pub fn set_properties(&self, handle: &RegistrationHandle, properties: Properties) -> Result<()> {
        let _delivery = self.lock_delivery()?;
        let mut modified = Vec::new();
        let mut added = Vec::new();
        let mut removing = Vec::new();
        let provider = {
            let state = self.read_state()?;
            let provider = state
                .providers
                .get(&handle.id)
                .cloned()
                .ok_or(RegistryError::UnknownRegistration { id: handle.id })?;
            let before = provider.properties();
            provider.replace_properties(properties);
            let after = provider.properties();
            for entry in state.listeners.values() {
                let was = entry.interested_in(&provider, &before);
                let is = entry.interested_in(&provider, &after);
                match (was, is) {
                    (true, true) => modified.push(entry.listener.clone()),
                    (false, true) => added.push(entry.listener.clone()),
                    (true, false) => removing.push(entry.listener.clone()),
                    (false, false) => {}
                }
            }
            provider
        };

        let Some(value) = provider.value() else {
            return Ok(());
        };
        debug!(
            "Provider {} of '{}' modified ({} modified, {} added, {} removing)",
            provider.id(),
            provider.capability(),
            modified.len(),
            added.len(),
            removing.len()
        );
        for listener in modified {
            listener.modified(&provider, value.clone());
        }
        for listener in added {
            listener.added(&provider, value.clone());
        }
        for listener in removing {
            listener.removing(&provider, value.clone());
        }
        Ok(())
    }

    /// Number of live registrations
    pub fn provider_count(&self) -> usize {
        self.read_state().map(|s| s.providers.len()).unwrap_or(0)
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.read_state().map(|s| s.listeners.len()).unwrap_or(0)
    }
}

impl Default for LocalCapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Manual Debug implementation, listeners are trait objects
impl fmt::Debug for LocalCapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCapabilityRegistry")
            .field("providers", &self.provider_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl CapabilityRegistry for LocalCapabilityRegistry {
    fn register(
        &self,
        capability: &str,
        value: CapabilityValue,
        properties: Properties,
    ) -> Result<RegistrationHandle> {
        if capability.trim().is_empty() {
            return Err(RegistryError::EmptyCapability.into());
        }
        let _delivery = self.lock_delivery()?;
        let id = self.next_provider_id.fetch_add(1, Ordering::SeqCst);
        let provider = ProviderHandle::new(id, capability, value.clone(), properties);
        let listeners = {
            let mut state = self.write_state()?;
            state.providers.insert(id, provider.clone());
            Self::interested_listeners(&state, &provider, &provider.properties())
        };
        trace!(
            "Registered provider {} of '{}', notifying {} listener(s)",
            id,
            capability,
            listeners.len()
        );
        for listener in listeners {
            listener.added(&provider, value.clone());
        }
        Ok(RegistrationHandle {
            id,
            capability: capability.to_string(),
        })
    }

    fn unregister(&self, handle: &RegistrationHandle) -> Result<()> {
        let _delivery = self.lock_delivery()?;
        let (provider, listeners) = {
            let mut state = self.write_state()?;
            let Some(provider) = state.providers.remove(&handle.id) else {
                trace!("Ignoring unregister of unknown provider {}", handle.id);
                return Ok(());
            };
            let listeners = Self::interested_listeners(&state, &provider, &provider.properties());
            (provider, listeners)
        };
        if let Some(value) = provider.value() {
            for listener in &listeners {
                listener.removing(&provider, value.clone());
            }
        }
        provider.withdraw();
        trace!(
            "Unregistered provider {} of '{}'",
            handle.id, handle.capability
        );
        Ok(())
    }

    fn find(&self, capability: &str, filter: &Filter) -> Result<Vec<ProviderHandle>> {
        let state = self.read_state()?;
        Ok(state
            .providers
            .values()
            .filter(|p| p.capability() == capability && p.is_available())
            .filter(|p| filter.matches(&p.properties()))
            .cloned()
            .collect())
    }

    fn listen(
        &self,
        capability: &str,
        filter: Filter,
        listener: Arc<dyn CapabilityListener>,
        replay_existing: bool,
    ) -> Result<ListenerId> {
        if capability.trim().is_empty() {
            return Err(RegistryError::EmptyCapability.into());
        }
        let _delivery = self.lock_delivery()?;
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        let replay = {
            let mut state = self.write_state()?;
            let replay: Vec<ProviderHandle> = if replay_existing {
                state
                    .providers
                    .values()
                    .filter(|p| p.capability() == capability && p.is_available())
                    .filter(|p| filter.matches(&p.properties()))
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            state.listeners.insert(
                id,
                ListenerEntry {
                    capability: capability.to_string(),
                    filter,
                    listener: listener.clone(),
                },
            );
            replay
        };
        debug!(
            "Listener {} registered for '{}' (replaying {})",
            id,
            capability,
            replay.len()
        );
        for provider in replay {
            if let Some(value) = provider.value() {
                listener.added(&provider, value);
            }
        }
        Ok(id)
    }

    fn unlisten(&self, id: ListenerId) -> Result<bool> {
        let _delivery = self.lock_delivery()?;
        let mut state = self.write_state()?;
        Ok(state.listeners.remove(&id).is_some())
    }
}
