//! # Conduit Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type.
//!
//! Each subsystem keeps its own typed error enum (dependency tracking,
//! lifecycle, capability registry, filters, declarations, engine config) and
//! [`Error`] wraps them through `#[from]` variants, so `?` works across module
//! boundaries while callers can still match on the precise cause.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::error::ConfigError;
use crate::dependency::error::{ConfigurationError, DependencyError};
use crate::lifecycle::error::LifecycleError;
use crate::registry::error::{FilterError, RegistryError};
use crate::registry::ProviderId;

/// Crate-wide error type
#[derive(Debug, ThisError)]
pub enum Error {
    /// Protocol violation inside a dependency tracker
    #[error("Dependency tracking error: {0}")]
    Dependency(#[from] DependencyError),

    /// Declaration or specification problem detected at construction time
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Lifecycle protocol violation
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Capability registry failure
    #[error("Capability registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Malformed filter expression
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Engine configuration file problem
    #[error("Engine config error: {0}")]
    Config(#[from] ConfigError),

    /// The provider backing an attach or detach step went away mid-operation.
    /// Detach steps failing with this error are logged and ignored.
    #[error("Provider {provider_id} of capability '{capability}' vanished")]
    ProviderVanished {
        capability: String,
        provider_id: ProviderId,
    },

    /// Component type lookup failed
    #[error("Unknown component type '{type_name}'")]
    UnknownComponentType { type_name: String },

    /// Component type registered twice
    #[error("Component type '{type_name}' is already registered")]
    DuplicateComponentType { type_name: String },

    /// A specification name is already in use by a live instance
    #[error("Instance '{name}' is already launched")]
    DuplicateInstance { name: String },

    /// No live instance with the given name
    #[error("Unknown instance '{name}'")]
    UnknownInstance { name: String },

    /// The instance task has stopped and no longer accepts requests
    #[error("Instance '{name}' is no longer running")]
    InstanceGone { name: String },

    /// Shutdown did not complete within the configured timeout
    #[error("Shutdown of instance '{name}' timed out after {timeout_ms}ms")]
    ShutdownTimedOut { name: String, timeout_ms: u64 },

    /// A component callback or resolver reported a failure
    #[error("Callback failed: {0}")]
    Callback(String),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Helper for attach/detach callbacks reporting a provider that went away.
    pub fn provider_vanished(capability: impl Into<String>, provider_id: ProviderId) -> Self {
        Error::ProviderVanished {
            capability: capability.into(),
            provider_id,
        }
    }

    /// Whether this error stems from a provider disappearing underneath us.
    pub fn is_provider_vanished(&self) -> bool {
        matches!(self, Error::ProviderVanished { .. })
    }
}
