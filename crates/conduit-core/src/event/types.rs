use serde::Serialize;

use crate::lifecycle::{FailureRecord, LifecycleState};

/// Events published by running instances
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InstanceEvent {
    /// A transition was applied
    StateChanged {
        instance: String,
        from: LifecycleState,
        to: LifecycleState,
    },
    /// The instance reached `SERVICES_EXPOSED` with no failure since
    Launchable { instance: String },
    /// A failure record was appended; `fatal` when it drove the instance to `FAILED`
    FailureRecorded {
        instance: String,
        failure: FailureRecord,
        fatal: bool,
    },
    /// The instance was disposed
    Disposed { instance: String },
}

impl InstanceEvent {
    /// Name handlers register against
    pub fn name(&self) -> &'static str {
        match self {
            InstanceEvent::StateChanged { .. } => "instance.state_changed",
            InstanceEvent::Launchable { .. } => "instance.launchable",
            InstanceEvent::FailureRecorded { .. } => "instance.failure",
            InstanceEvent::Disposed { .. } => "instance.disposed",
        }
    }

    /// Name of the instance the event concerns
    pub fn instance(&self) -> &str {
        match self {
            InstanceEvent::StateChanged { instance, .. }
            | InstanceEvent::Launchable { instance }
            | InstanceEvent::FailureRecorded { instance, .. }
            | InstanceEvent::Disposed { instance } => instance,
        }
    }
}
