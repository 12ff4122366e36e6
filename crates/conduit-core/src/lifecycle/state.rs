use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a component instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Newborn,
    Configured,
    ResolvingDependencies,
    DependenciesResolved,
    ServicesExposed,
    Active,
    Failed,
    Disposed,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 8] = [
        LifecycleState::Newborn,
        LifecycleState::Configured,
        LifecycleState::ResolvingDependencies,
        LifecycleState::DependenciesResolved,
        LifecycleState::ServicesExposed,
        LifecycleState::Active,
        LifecycleState::Failed,
        LifecycleState::Disposed,
    ];

    /// At or past `DEPENDENCIES_RESOLVED` without having failed or been disposed
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            LifecycleState::DependenciesResolved
                | LifecycleState::ServicesExposed
                | LifecycleState::Active
        )
    }

    /// `FAILED` and `DISPOSED` accept nothing but disposal
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Failed | LifecycleState::Disposed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Newborn => "NEWBORN",
            LifecycleState::Configured => "CONFIGURED",
            LifecycleState::ResolvingDependencies => "RESOLVING_DEPENDENCIES",
            LifecycleState::DependenciesResolved => "DEPENDENCIES_RESOLVED",
            LifecycleState::ServicesExposed => "SERVICES_EXPOSED",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Failed => "FAILED",
            LifecycleState::Disposed => "DISPOSED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transitions of the lifecycle state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Configure,
    Initialize,
    BecomeResolved,
    CompleteExposure,
    Activate,
    BecomeUnresolved,
    Fail,
    Dispose,
}

const FROM_NEWBORN: &[LifecycleState] = &[LifecycleState::Newborn];
const FROM_CONFIGURED: &[LifecycleState] = &[LifecycleState::Configured];
const FROM_RESOLVING: &[LifecycleState] = &[LifecycleState::ResolvingDependencies];
const FROM_RESOLVED: &[LifecycleState] = &[LifecycleState::DependenciesResolved];
const FROM_EXPOSED: &[LifecycleState] = &[LifecycleState::ServicesExposed];
const FROM_RESOLVED_ONWARDS: &[LifecycleState] = &[
    LifecycleState::Active,
    LifecycleState::DependenciesResolved,
    LifecycleState::ServicesExposed,
];

impl Transition {
    pub const ALL: [Transition; 8] = [
        Transition::Configure,
        Transition::Initialize,
        Transition::BecomeResolved,
        Transition::CompleteExposure,
        Transition::Activate,
        Transition::BecomeUnresolved,
        Transition::Fail,
        Transition::Dispose,
    ];

    /// Starting states; `None` means any state
    pub fn sources(&self) -> Option<&'static [LifecycleState]> {
        match self {
            Transition::Configure => Some(FROM_NEWBORN),
            Transition::Initialize => Some(FROM_CONFIGURED),
            Transition::BecomeResolved => Some(FROM_RESOLVING),
            Transition::CompleteExposure => Some(FROM_RESOLVED),
            Transition::Activate => Some(FROM_EXPOSED),
            Transition::BecomeUnresolved => Some(FROM_RESOLVED_ONWARDS),
            Transition::Fail | Transition::Dispose => None,
        }
    }

    pub fn target(&self) -> LifecycleState {
        match self {
            Transition::Configure => LifecycleState::Configured,
            Transition::Initialize => LifecycleState::ResolvingDependencies,
            Transition::BecomeResolved => LifecycleState::DependenciesResolved,
            Transition::CompleteExposure => LifecycleState::ServicesExposed,
            Transition::Activate => LifecycleState::Active,
            Transition::BecomeUnresolved => LifecycleState::ResolvingDependencies,
            Transition::Fail => LifecycleState::Failed,
            Transition::Dispose => LifecycleState::Disposed,
        }
    }

    /// Whether the transition may start from `state`
    pub fn accepts(&self, state: LifecycleState) -> bool {
        self.sources()
            .is_none_or(|sources| sources.contains(&state))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Configure => "CONFIGURE",
            Transition::Initialize => "INITIALIZE",
            Transition::BecomeResolved => "BECOME_RESOLVED",
            Transition::CompleteExposure => "COMPLETE_EXPOSURE",
            Transition::Activate => "ACTIVATE",
            Transition::BecomeUnresolved => "BECOME_UNRESOLVED",
            Transition::Fail => "FAIL",
            Transition::Dispose => "DISPOSE",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
