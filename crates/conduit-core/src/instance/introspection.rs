use serde::{Deserialize, Serialize};

use crate::lifecycle::{FailureRecord, LifecycleState};
use crate::registry::{ProviderId, RegistrationHandle};

/// Serializable view of one injection point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionSummary {
    pub name: String,
    pub capability: String,
    pub filter: String,
    pub required: bool,
    pub minimum: usize,
    pub multiple: bool,
    pub complete: bool,
    /// Every provider counted towards the minimum
    pub bound: Vec<ProviderId>,
    /// Providers currently attached to the component
    pub attached: Vec<ProviderId>,
}

/// Serializable view of one exposure point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSummary {
    pub name: String,
    pub capability: String,
    pub requires: Vec<String>,
    pub required: bool,
    pub persistent: bool,
    pub complete: bool,
    pub published: Vec<RegistrationHandle>,
}

/// Serializable view of a whole instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub name: String,
    pub component_type: String,
    pub state: LifecycleState,
    pub launchable: bool,
    pub injections: Vec<InjectionSummary>,
    pub exposures: Vec<ExposureSummary>,
    pub failures: Vec<FailureRecord>,
}

impl InstanceSummary {
    pub fn injection(&self, name: &str) -> Option<&InjectionSummary> {
        self.injections.iter().find(|p| p.name == name)
    }

    pub fn exposure(&self, name: &str) -> Option<&ExposureSummary> {
        self.exposures.iter().find(|p| p.name == name)
    }
}
