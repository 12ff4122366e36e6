pub mod config;
pub mod dependency;
pub mod event;
pub mod instance;
pub mod kernel;
pub mod lifecycle;
pub mod registry;

// Re-export key public types for easier use by the binary and embedders
pub use config::EngineConfig;
pub use dependency::{
    AttachPoint, BoundCollection, ExposureDecl, Exposed, InjectionDecl, Injected, Publication, Slot,
};
pub use event::{EventResult, InstanceEvent, SharedEventDispatcher};
pub use instance::{ComponentInstance, InstanceRef};
pub use kernel::error::{Error, Result};
pub use kernel::{Component, ComponentDefinition, ComponentSpec, ConstructorArgs, Engine};
pub use lifecycle::{FailureRecord, LifecycleState, Transition};
pub use registry::{
    CapabilityListener, CapabilityRegistry, CapabilityValue, Filter, LocalCapabilityRegistry,
    Properties, ProviderHandle, RegistrationHandle,
};

#[cfg(test)]
mod tests;
