use thiserror::Error;

use crate::lifecycle::Transition;

/// Lifecycle protocol violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Instance '{instance}' is disposed and cannot {transition}")]
    InstanceDisposed {
        instance: String,
        transition: Transition,
    },
}
