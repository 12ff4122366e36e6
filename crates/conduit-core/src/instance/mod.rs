//! # Conduit Instances
//!
//! Each launched specification runs as one tokio task owning its
//! [`InstanceManager`]: the component value, its lifecycle state machine and
//! both dependency trackers. Everything that can affect the lifecycle
//! (provider events, launch and shutdown requests) arrives as a message on
//! the task's queue and is handled one at a time.
//!
//! [`ComponentInstance`] is the cloneable handle the outside world holds.
//! The task stops once it is shut down or every handle is dropped; the
//! [`InstanceRef`] an instance publishes about itself does not keep it alive.
pub mod introspection;
pub mod manager;

use std::fmt;

use log::trace;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, watch};

use crate::kernel::error::{Error, Result};
use crate::lifecycle::{FailureRecord, InstanceStatus, LifecycleState};
use crate::registry::{CapabilityListener, CapabilityValue, ProviderHandle};

pub use introspection::{ExposureSummary, InjectionSummary, InstanceSummary};
pub use manager::InstanceManager;

/// Messages processed by an instance task, in arrival order
pub(crate) enum InstanceMessage {
    ProviderAdded {
        point: String,
        provider: ProviderHandle,
        value: CapabilityValue,
    },
    ProviderModified {
        point: String,
        provider: ProviderHandle,
        value: CapabilityValue,
    },
    ProviderRemoving {
        point: String,
        provider: ProviderHandle,
        value: CapabilityValue,
    },
    Launch {
        reply: oneshot::Sender<Result<LifecycleState>>,
    },
    Describe {
        reply: oneshot::Sender<InstanceSummary>,
    },
    Settle {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Registry listener of one injection point. Only enqueues.
pub(crate) struct PointListener {
    point: String,
    sender: WeakUnboundedSender<InstanceMessage>,
}

impl PointListener {
    pub(crate) fn new(point: impl Into<String>, sender: WeakUnboundedSender<InstanceMessage>) -> Self {
        Self {
            point: point.into(),
            sender,
        }
    }

    fn enqueue(&self, message: InstanceMessage) {
        let delivered = self
            .sender
            .upgrade()
            .is_some_and(|sender| sender.send(message).is_ok());
        if !delivered {
            trace!("Instance behind point '{}' is gone, dropping event", self.point);
        }
    }
}

impl CapabilityListener for PointListener {
    fn added(&self, provider: &ProviderHandle, value: CapabilityValue) {
        self.enqueue(InstanceMessage::ProviderAdded {
            point: self.point.clone(),
            provider: provider.clone(),
            value,
        });
    }

    fn modified(&self, provider: &ProviderHandle, value: CapabilityValue) {
        self.enqueue(InstanceMessage::ProviderModified {
            point: self.point.clone(),
            provider: provider.clone(),
            value,
        });
    }

    fn removing(&self, provider: &ProviderHandle, value: CapabilityValue) {
        self.enqueue(InstanceMessage::ProviderRemoving {
            point: self.point.clone(),
            provider: provider.clone(),
            value,
        });
    }
}

/// Handle onto a running instance
#[derive(Clone)]
pub struct ComponentInstance {
    name: String,
    component_type: String,
    sender: UnboundedSender<InstanceMessage>,
    status: watch::Receiver<InstanceStatus>,
}

impl ComponentInstance {
    pub(crate) fn new(
        name: impl Into<String>,
        component_type: impl Into<String>,
        sender: UnboundedSender<InstanceMessage>,
        status: watch::Receiver<InstanceStatus>,
    ) -> Self {
        Self {
            name: name.into(),
            component_type: component_type.into(),
            sender,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    pub fn status(&self) -> InstanceStatus {
        self.status.borrow().clone()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.status.borrow().state
    }

    /// Reached `SERVICES_EXPOSED` and no failure recorded since
    pub fn is_launchable(&self) -> bool {
        self.status.borrow().launchable
    }

    /// Reference that does not keep the instance task alive
    pub fn downgrade(&self) -> InstanceRef {
        InstanceRef {
            name: self.name.clone(),
            component_type: self.component_type.clone(),
            sender: self.sender.downgrade(),
            status: self.status.clone(),
        }
    }

    fn gone(&self) -> Error {
        Error::InstanceGone {
            name: self.name.clone(),
        }
    }

    async fn request<T>(&self, message: impl FnOnce(oneshot::Sender<T>) -> InstanceMessage) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender.send(message(reply)).map_err(|_| self.gone())?;
        response.await.map_err(|_| self.gone())
    }

    /// Fire `ACTIVATE` if the instance is launchable. Returns the state after
    /// the request was handled.
    pub async fn launch(&self) -> Result<LifecycleState> {
        self.request(|reply| InstanceMessage::Launch { reply }).await?
    }

    /// Tear the instance down and dispose it. Calling this again, or on an
    /// instance that already stopped, does nothing.
    pub async fn shutdown(&self) -> Result<()> {
        match self.request(|reply| InstanceMessage::Shutdown { reply }).await {
            Ok(()) | Err(Error::InstanceGone { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn describe(&self) -> Result<InstanceSummary> {
        self.request(|reply| InstanceMessage::Describe { reply }).await
    }

    /// Resolves once every message queued before this call has been handled.
    pub async fn settle(&self) -> Result<()> {
        self.request(|reply| InstanceMessage::Settle { reply }).await
    }

    pub async fn failures(&self) -> Result<Vec<FailureRecord>> {
        Ok(self.describe().await?.failures)
    }

    /// Wait until the instance enters `state`. Returns immediately if it is
    /// already there.
    pub async fn wait_for_state(&self, state: LifecycleState) -> Result<()> {
        let mut status = self.status.clone();
        let reached = status.wait_for(|s| s.state == state).await.is_ok();
        if reached { Ok(()) } else { Err(self.gone()) }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name)
            .field("component_type", &self.component_type)
            .field("state", &self.lifecycle_state())
            .finish()
    }
}

/// Value an instance registers under the component capability
#[derive(Clone)]
pub struct InstanceRef {
    name: String,
    component_type: String,
    sender: WeakUnboundedSender<InstanceMessage>,
    status: watch::Receiver<InstanceStatus>,
}

impl InstanceRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    /// Last state the instance reported
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.status.borrow().state
    }

    /// Full handle, while the instance task is still running
    pub fn upgrade(&self) -> Option<ComponentInstance> {
        let sender = self.sender.upgrade().filter(|sender| !sender.is_closed())?;
        Some(ComponentInstance {
            name: self.name.clone(),
            component_type: self.component_type.clone(),
            sender,
            status: self.status.clone(),
        })
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRef")
            .field("name", &self.name)
            .field("state", &self.lifecycle_state())
            .finish()
    }
}
