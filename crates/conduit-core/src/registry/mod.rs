//! # Conduit Capability Registry
//!
//! The boundary between the lifecycle engine and whatever publishes
//! capabilities. The engine only talks to a registry through the
//! [`CapabilityRegistry`] trait: register a value under a capability name,
//! find current providers, and listen for providers coming and going.
//!
//! [`LocalCapabilityRegistry`] is the in-process implementation used by the
//! engine when no other registry is supplied.
//!
//! Listener callbacks are invoked synchronously by the registry. Implementations
//! of [`CapabilityListener`] must return quickly and must not call back into
//! the registry from inside a callback.
pub mod error;
pub mod filter;
pub mod local;
pub mod provider;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::kernel::error::Result;

pub use error::{FilterError, RegistryError};
pub use filter::Filter;
pub use local::LocalCapabilityRegistry;
pub use provider::{ProviderHandle, RegistrationHandle};

/// A published capability value; consumers downcast to the concrete type
pub type CapabilityValue = Arc<dyn Any + Send + Sync>;

/// Metadata attached to providers and component specifications
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Registry-assigned provider identifier
pub type ProviderId = u64;

/// Identifier returned by [`CapabilityRegistry::listen`]
pub type ListenerId = u64;

/// Receives provider notifications for one capability and filter
pub trait CapabilityListener: Send + Sync {
    /// A matching provider appeared (or was replayed at listen time).
    fn added(&self, provider: &ProviderHandle, value: CapabilityValue);

    /// A matching provider changed its metadata and still matches.
    fn modified(&self, _provider: &ProviderHandle, _value: CapabilityValue) {}

    /// A matching provider is about to go away. The value is still reachable
    /// through `value` even though the provider will be withdrawn right after.
    fn removing(&self, provider: &ProviderHandle, value: CapabilityValue);
}

/// Abstract capability registry consumed by the engine
pub trait CapabilityRegistry: Send + Sync {
    /// Publish `value` under `capability`. Safe to call concurrently.
    fn register(
        &self,
        capability: &str,
        value: CapabilityValue,
        properties: Properties,
    ) -> Result<RegistrationHandle>;

    /// Withdraw a registration. Unknown or already removed handles are accepted.
    fn unregister(&self, handle: &RegistrationHandle) -> Result<()>;

    /// Snapshot of the providers currently matching, ordered by provider id.
    fn find(&self, capability: &str, filter: &Filter) -> Result<Vec<ProviderHandle>>;

    /// Subscribe to matching provider events. With `replay_existing`, current
    /// matches are delivered as `added` before any later event.
    fn listen(
        &self,
        capability: &str,
        filter: Filter,
        listener: Arc<dyn CapabilityListener>,
        replay_existing: bool,
    ) -> Result<ListenerId>;

    /// Remove a listener. Returns whether it was registered.
    fn unlisten(&self, id: ListenerId) -> Result<bool>;
}

// Test module declaration
#[cfg(test)]
mod tests;
