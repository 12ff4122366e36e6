use std::error::Error as StdError;
use std::fmt;
use std::time::SystemTime;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::event::{InstanceEvent, SharedEventDispatcher};
use crate::kernel::component::Component;
use crate::kernel::error::{Error, Result};
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::{LifecycleState, Transition};
use crate::registry::Properties;

/// Where a failure came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureOrigin {
    Transition { transition: Transition },
    Injection { point: String },
    Exposure { point: String },
    Teardown,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOrigin::Transition { transition } => write!(f, "transition {}", transition),
            FailureOrigin::Injection { point } => write!(f, "injection point '{}'", point),
            FailureOrigin::Exposure { point } => write!(f, "exposure point '{}'", point),
            FailureOrigin::Teardown => write!(f, "teardown"),
        }
    }
}

/// Entry of an instance's failure log. Records are appended, never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub origin: FailureOrigin,
    pub message: String,
    pub cause: Option<String>,
    pub recorded_at: SystemTime,
}

impl FailureRecord {
    pub fn new(origin: FailureOrigin, message: impl Into<String>) -> Self {
        Self {
            origin,
            message: message.into(),
            cause: None,
            recorded_at: SystemTime::now(),
        }
    }

    pub fn from_error(origin: FailureOrigin, error: &Error) -> Self {
        Self {
            origin,
            message: error.to_string(),
            cause: error.source().map(|source| source.to_string()),
            recorded_at: SystemTime::now(),
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {})", cause)?;
        }
        Ok(())
    }
}

/// Result of asking the machine to fire a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The callback succeeded and the target state was entered
    Applied,
    /// The current state is not a starting state of the transition
    Skipped,
    /// The callback failed and the instance is now `FAILED`
    Failed,
}

/// Snapshot published to watchers on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatus {
    pub state: LifecycleState,
    pub launchable: bool,
    pub failure_count: usize,
}

/// Authoritative lifecycle state of one instance.
///
/// Only the owning instance manager calls the transition entry points. Every
/// applied transition is logged, published on a `watch` channel and queued
/// as an [`InstanceEvent`]; observers never run on the instance's task.
pub struct LifecycleStateMachine {
    instance: String,
    state: LifecycleState,
    failures: Vec<FailureRecord>,
    // Failure count at the moment SERVICES_EXPOSED was entered
    exposed_at: Option<usize>,
    status: watch::Sender<InstanceStatus>,
    events: SharedEventDispatcher,
}

impl LifecycleStateMachine {
    pub fn new(instance: impl Into<String>, events: SharedEventDispatcher) -> Self {
        let (status, _) = watch::channel(InstanceStatus {
            state: LifecycleState::Newborn,
            launchable: false,
            failure_count: 0,
        });
        Self {
            instance: instance.into(),
            state: LifecycleState::Newborn,
            failures: Vec::new(),
            exposed_at: None,
            status,
            events,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// `SERVICES_EXPOSED` reached and no failure recorded since
    pub fn is_launchable(&self) -> bool {
        self.state == LifecycleState::ServicesExposed && self.exposed_at == Some(self.failures.len())
    }

    pub fn subscribe(&self) -> watch::Receiver<InstanceStatus> {
        self.status.subscribe()
    }

    fn publish_status(&self) {
        self.status.send_replace(InstanceStatus {
            state: self.state,
            launchable: self.is_launchable(),
            failure_count: self.failures.len(),
        });
    }

    /// Fire a transition, running its callback on `component`.
    ///
    /// Transitions not accepted from the current state are skipped. A failing
    /// callback turns into `FAIL`, except for `DISPOSE` which records the
    /// failure and still disposes. Any transition other than `DISPOSE` on a
    /// disposed instance is a protocol violation.
    pub async fn fire<C: Component>(
        &mut self,
        transition: Transition,
        component: &mut C,
        properties: &Properties,
    ) -> Result<TransitionOutcome> {
        if self.state == LifecycleState::Disposed {
            if transition == Transition::Dispose {
                debug!("Instance '{}' already disposed, ignoring DISPOSE", self.instance);
                return Ok(TransitionOutcome::Skipped);
            }
            return Err(LifecycleError::InstanceDisposed {
                instance: self.instance.clone(),
                transition,
            }
            .into());
        }
        if !transition.accepts(self.state) {
            debug!(
                "Instance '{}' skipping {} from {}",
                self.instance, transition, self.state
            );
            return Ok(TransitionOutcome::Skipped);
        }

        let result = match transition {
            Transition::Configure => component.configure(properties).await,
            Transition::Initialize => component.initialize().await,
            Transition::BecomeResolved => component.resolved().await,
            Transition::CompleteExposure => component.exposed().await,
            Transition::Activate => component.activate().await,
            Transition::BecomeUnresolved => component.unresolved().await,
            Transition::Dispose => component.dispose().await,
            Transition::Fail => {
                let failure = FailureRecord::new(
                    FailureOrigin::Transition { transition },
                    "failure requested",
                );
                return Ok(self.fail(component, failure).await);
            }
        };

        match result {
            Ok(()) => {
                self.apply(transition.target());
                Ok(TransitionOutcome::Applied)
            }
            Err(e) if transition == Transition::Dispose => {
                let failure = FailureRecord::from_error(FailureOrigin::Transition { transition }, &e);
                self.record_failure(failure);
                self.apply(LifecycleState::Disposed);
                Ok(TransitionOutcome::Applied)
            }
            Err(e) => {
                let failure = FailureRecord::from_error(FailureOrigin::Transition { transition }, &e);
                Ok(self.fail(component, failure).await)
            }
        }
    }

    /// Drive the instance to `FAILED` with `failure` appended to the log.
    /// On an instance that already failed or was disposed, the record is
    /// appended without a transition.
    pub async fn fail<C: Component>(&mut self, component: &mut C, failure: FailureRecord) -> TransitionOutcome {
        if self.state.is_terminal() {
            self.record_failure(failure);
            return TransitionOutcome::Skipped;
        }
        error!("Instance '{}' failed: {}", self.instance, failure);
        self.failures.push(failure.clone());
        if let Err(e) = component.failed(&failure).await {
            error!("Instance '{}' failure callback raised: {}", self.instance, e);
        }
        self.events.publish(InstanceEvent::FailureRecorded {
            instance: self.instance.clone(),
            failure,
            fatal: true,
        });
        self.apply(LifecycleState::Failed);
        TransitionOutcome::Failed
    }

    /// Append a failure without changing state. Clears launchability.
    pub fn record_failure(&mut self, failure: FailureRecord) {
        error!("Instance '{}' recorded failure: {}", self.instance, failure);
        self.failures.push(failure.clone());
        self.publish_status();
        self.events.publish(InstanceEvent::FailureRecorded {
            instance: self.instance.clone(),
            failure,
            fatal: false,
        });
    }

    fn apply(&mut self, target: LifecycleState) {
        let from = self.state;
        self.state = target;
        if target == LifecycleState::ServicesExposed {
            self.exposed_at = Some(self.failures.len());
        }
        info!("Instance '{}': {} -> {}", self.instance, from, target);
        self.publish_status();
        self.events.publish(InstanceEvent::StateChanged {
            instance: self.instance.clone(),
            from,
            to: target,
        });
        if self.is_launchable() {
            self.events.publish(InstanceEvent::Launchable {
                instance: self.instance.clone(),
            });
        }
        if target == LifecycleState::Disposed {
            self.events.publish(InstanceEvent::Disposed {
                instance: self.instance.clone(),
            });
        }
    }
}

impl fmt::Debug for LifecycleStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleStateMachine")
            .field("instance", &self.instance)
            .field("state", &self.state)
            .field("failures", &self.failures.len())
            .finish()
    }
}
