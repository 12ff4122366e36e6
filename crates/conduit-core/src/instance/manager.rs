use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, WeakUnboundedSender};
use tokio::sync::oneshot;

use crate::dependency::error::DependencyError;
use crate::dependency::{DependencyTracker, ExposurePoint, InjectionPoint};
use crate::instance::{ComponentInstance, InstanceMessage, InstanceSummary, PointListener};
use crate::kernel::component::{
    Component, ComponentDefinition, ComponentSpec, ConstructorArgs, SpawnContext, TypeDigest,
};
use crate::kernel::constants::{COMPONENT_CAPABILITY, COMPONENT_NAME_KEY, COMPONENT_TYPE_KEY};
use crate::kernel::error::{Error, Result};
use crate::lifecycle::{
    FailureOrigin, FailureRecord, LifecycleState, LifecycleStateMachine, Transition,
    TransitionOutcome,
};
use crate::registry::{
    CapabilityRegistry, CapabilityValue, Properties, ProviderHandle, RegistrationHandle,
};

const INJECTION_ROLE: &str = "injection";
const EXPOSURE_ROLE: &str = "exposure";

/// Composition root of one instance.
///
/// Owns the component, its state machine and both trackers, and is the only
/// caller of the state machine's transition entry points. Runs on its own
/// task; see [`InstanceManager::spawn`].
pub struct InstanceManager<C: Component> {
    spec: ComponentSpec,
    component: C,
    machine: LifecycleStateMachine,
    injections: DependencyTracker<InjectionPoint<C>>,
    exposures: DependencyTracker<ExposurePoint<C>>,
    registry: Arc<dyn CapabilityRegistry>,
    sender: WeakUnboundedSender<InstanceMessage>,
    identity: Properties,
    own_registration: Option<RegistrationHandle>,
    torn_down: bool,
}

fn unknown_point(role: &'static str, name: &str) -> Error {
    DependencyError::UnknownPoint {
        role,
        name: name.to_string(),
    }
    .into()
}

impl<C: Component> InstanceManager<C> {
    /// Build the instance described by `spec`, register its own capability and
    /// start its task. Returns once `CONFIGURE`, `INITIALIZE` and the first
    /// scan of every injection point have run.
    ///
    /// Declaration and specification problems are returned as errors. Callback
    /// failures are not: the instance comes up `FAILED` and stays inspectable.
    pub async fn spawn(
        definition: &ComponentDefinition<C>,
        spec: ComponentSpec,
        digest: Arc<TypeDigest>,
        context: SpawnContext,
    ) -> Result<ComponentInstance> {
        spec.validate()?;
        let filters = digest.resolve_filters(&spec)?;

        let mut slots = HashMap::new();
        let mut injections = DependencyTracker::new(INJECTION_ROLE);
        for decl in &definition.injections {
            let attach = decl.attach.fresh();
            if let Some(slot) = attach.slot() {
                slots.insert(decl.name.clone(), slot.clone());
            }
            let filter = filters.get(&decl.name).cloned().unwrap_or_default();
            injections.track(InjectionPoint::new(decl, filter, attach, context.retain_by_default))?;
        }
        let mut exposures = DependencyTracker::new(EXPOSURE_ROLE);
        for decl in &definition.exposures {
            exposures.track(ExposurePoint::new(decl))?;
        }

        let component = (definition.constructor)(&ConstructorArgs {
            properties: spec.properties.clone(),
            slots,
        })?;

        let mut identity = Properties::new();
        identity.insert(COMPONENT_NAME_KEY.to_string(), spec.name.clone().into());
        identity.insert(COMPONENT_TYPE_KEY.to_string(), definition.type_name.clone().into());

        let machine = LifecycleStateMachine::new(spec.name.clone(), context.events.clone());
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = ComponentInstance::new(
            spec.name.clone(),
            definition.type_name.clone(),
            sender.clone(),
            machine.subscribe(),
        );
        let own_registration = context.registry.register(
            COMPONENT_CAPABILITY,
            Arc::new(handle.downgrade()),
            identity.clone(),
        )?;

        let manager = InstanceManager {
            spec,
            component,
            machine,
            injections,
            exposures,
            registry: context.registry,
            sender: sender.downgrade(),
            identity,
            own_registration: Some(own_registration),
            torn_down: false,
        };
        let (booted, boot_result) = oneshot::channel();
        tokio::spawn(manager.run(receiver, booted));
        boot_result.await.map_err(|_| Error::InstanceGone {
            name: handle.name().to_string(),
        })??;
        Ok(handle)
    }

    async fn run(mut self, mut receiver: UnboundedReceiver<InstanceMessage>, booted: oneshot::Sender<Result<()>>) {
        let boot = self.boot().await;
        if boot.is_err() {
            self.teardown().await;
            let _ = booted.send(boot);
            return;
        }
        let _ = booted.send(Ok(()));

        while let Some(message) = receiver.recv().await {
            match message {
                InstanceMessage::ProviderAdded { point, provider, value } => {
                    self.on_provider(&point, provider, value, false).await;
                }
                InstanceMessage::ProviderModified { point, provider, value } => {
                    self.on_provider(&point, provider, value, true).await;
                }
                InstanceMessage::ProviderRemoving { point, provider, value } => {
                    self.on_provider_removing(&point, &provider, value).await;
                }
                InstanceMessage::Launch { reply } => {
                    let _ = reply.send(self.launch().await);
                }
                InstanceMessage::Describe { reply } => {
                    let _ = reply.send(self.summary());
                }
                InstanceMessage::Settle { reply } => {
                    let _ = reply.send(());
                }
                InstanceMessage::Shutdown { reply } => {
                    self.teardown().await;
                    receiver.close();
                    let _ = reply.send(());
                    break;
                }
            }
        }
        if !self.torn_down {
            self.teardown().await;
        }
        debug!("Instance '{}' task finished", self.spec.name);
    }

    async fn boot(&mut self) -> Result<()> {
        if self.fire(Transition::Configure).await? != TransitionOutcome::Applied {
            return Ok(());
        }
        if self.fire(Transition::Initialize).await? != TransitionOutcome::Applied {
            return Ok(());
        }
        for name in self.injections.names() {
            let listener = Arc::new(PointListener::new(name.clone(), self.sender.clone()));
            let point = self
                .injections
                .get_mut(&name)
                .ok_or_else(|| unknown_point(INJECTION_ROLE, &name))?;
            let activated = point.activate(&mut self.component, self.registry.as_ref(), listener);
            if let Err(e) = activated {
                let failure = FailureRecord::from_error(FailureOrigin::Injection { point: name.clone() }, &e);
                self.machine.record_failure(failure);
            }
            self.injections.reevaluate(&name)?;
        }
        self.evaluate().await
    }

    /// Fire through the state machine; a transition that ends in `FAILED`
    /// withdraws every publication.
    async fn fire(&mut self, transition: Transition) -> Result<TransitionOutcome> {
        let outcome = self
            .machine
            .fire(transition, &mut self.component, &self.spec.properties)
            .await?;
        if outcome == TransitionOutcome::Failed {
            self.deactivate_exposures(|_| true).await;
        }
        Ok(outcome)
    }

    async fn fail(&mut self, failure: FailureRecord) {
        self.machine.fail(&mut self.component, failure).await;
        self.deactivate_exposures(|_| true).await;
    }

    /// Move the lifecycle forward as far as current completeness allows.
    async fn evaluate(&mut self) -> Result<()> {
        if self.machine.state() == LifecycleState::ResolvingDependencies
            && self.injections.is_required_complete()
            && self.fire(Transition::BecomeResolved).await? != TransitionOutcome::Applied
        {
            return Ok(());
        }
        if !self.machine.state().is_resolved() {
            return Ok(());
        }

        let complete = self.injections.complete_set();
        for name in self.exposures.names() {
            let point = self
                .exposures
                .get_mut(&name)
                .ok_or_else(|| unknown_point(EXPOSURE_ROLE, &name))?;
            if point.is_active() || !point.is_ready_to_go(&complete) {
                continue;
            }
            if let Err(e) = point.activate(&self.component, &self.identity, self.registry.as_ref()) {
                let failure = FailureRecord::from_error(FailureOrigin::Exposure { point: name.clone() }, &e);
                self.fail(failure).await;
                return Ok(());
            }
            self.exposures.reevaluate(&name)?;
        }

        if self.machine.state() == LifecycleState::DependenciesResolved
            && self.exposures.is_required_complete()
        {
            self.fire(Transition::CompleteExposure).await?;
        }
        Ok(())
    }

    /// Withdraw active exposure points selected by `select`; failures are
    /// recorded and do not stop the others.
    async fn deactivate_exposures(&mut self, select: impl Fn(&ExposurePoint<C>) -> bool) {
        for name in self.exposures.names() {
            let Some(point) = self.exposures.get_mut(&name) else {
                continue;
            };
            if !point.is_active() || !select(&*point) {
                continue;
            }
            let withdrawn = point.deactivate(self.registry.as_ref());
            if let Err(e) = self.exposures.reevaluate(&name) {
                warn!("Instance '{}': {}", self.spec.name, e);
            }
            if let Err(e) = withdrawn {
                let failure = FailureRecord::from_error(FailureOrigin::Exposure { point: name.clone() }, &e);
                self.machine.record_failure(failure);
            }
        }
    }

    async fn on_provider(&mut self, point: &str, provider: ProviderHandle, value: CapabilityValue, is_update: bool) {
        let Some(injection) = self.injections.get_mut(point) else {
            warn!("Instance '{}' got an event for unknown point '{}'", self.spec.name, point);
            return;
        };
        if let Err(e) = injection.inject(&mut self.component, provider, value, is_update) {
            let failure = FailureRecord::from_error(FailureOrigin::Injection { point: point.to_string() }, &e);
            self.machine.record_failure(failure);
        }
        self.after_injection_change(point).await;
    }

    async fn on_provider_removing(&mut self, point: &str, provider: &ProviderHandle, value: CapabilityValue) {
        let Some(injection) = self.injections.get_mut(point) else {
            warn!("Instance '{}' got an event for unknown point '{}'", self.spec.name, point);
            return;
        };
        if let Err(e) = injection.uninject(&mut self.component, provider, Some(value), false) {
            let failure = FailureRecord::from_error(FailureOrigin::Injection { point: point.to_string() }, &e);
            self.machine.record_failure(failure);
        }
        self.after_injection_change(point).await;
    }

    /// Re-index the point, react to a loss, then move forward if possible.
    async fn after_injection_change(&mut self, point: &str) {
        let lost = match self.injections.reevaluate(point) {
            Ok(changed) => changed && !self.injections.is_complete(point),
            Err(e) => {
                warn!("Instance '{}': {}", self.spec.name, e);
                return;
            }
        };
        if lost {
            self.on_setback().await;
            self.rebind(point).await;
        }
        if let Err(e) = self.evaluate().await {
            warn!("Instance '{}' could not re-evaluate: {}", self.spec.name, e);
        }
    }

    /// Give an emptied single-valued point one of its standbys.
    async fn rebind(&mut self, point: &str) {
        let Some(injection) = self.injections.get_mut(point) else {
            return;
        };
        if let Err(e) = injection.rebind(&mut self.component) {
            let failure = FailureRecord::from_error(FailureOrigin::Injection { point: point.to_string() }, &e);
            self.machine.record_failure(failure);
        }
        if let Err(e) = self.injections.reevaluate(point) {
            warn!("Instance '{}': {}", self.spec.name, e);
        }
    }

    async fn on_setback(&mut self) {
        let complete = self.injections.complete_set();
        self.deactivate_exposures(|p| !p.is_persistent() && !p.is_ready_to_go(&complete))
            .await;
        if self.machine.state().is_resolved() && !self.injections.is_required_complete() {
            if let Err(e) = self.fire(Transition::BecomeUnresolved).await {
                warn!("Instance '{}' could not regress: {}", self.spec.name, e);
            }
        }
    }

    async fn launch(&mut self) -> Result<LifecycleState> {
        if !self.machine.is_launchable() {
            debug!(
                "Instance '{}' is not launchable in {}",
                self.spec.name,
                self.machine.state()
            );
            return Ok(self.machine.state());
        }
        self.fire(Transition::Activate).await?;
        Ok(self.machine.state())
    }

    /// Exposure points, then injection points, then the own registration,
    /// then `DISPOSE`. Partial failures are logged.
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!("Tearing down instance '{}'", self.spec.name);

        for name in self.exposures.names() {
            if let Some(point) = self.exposures.get_mut(&name) {
                if let Err(e) = point.deactivate(self.registry.as_ref()) {
                    warn!("Instance '{}' teardown of exposure '{}': {}", self.spec.name, name, e);
                }
            }
            let _ = self.exposures.reevaluate(&name);
        }
        for name in self.injections.names() {
            if let Some(point) = self.injections.get_mut(&name) {
                point.deactivate(&mut self.component, self.registry.as_ref());
            }
            let _ = self.injections.reevaluate(&name);
        }
        if let Some(handle) = self.own_registration.take() {
            if let Err(e) = self.registry.unregister(&handle) {
                warn!("Instance '{}' could not withdraw its registration: {}", self.spec.name, e);
            }
        }
        if let Err(e) = self.fire(Transition::Dispose).await {
            warn!("Instance '{}' dispose: {}", self.spec.name, e);
        }
    }

    fn summary(&self) -> InstanceSummary {
        InstanceSummary {
            name: self.spec.name.clone(),
            component_type: self.spec.component_type.clone(),
            state: self.machine.state(),
            launchable: self.machine.is_launchable(),
            injections: self.injections.points().map(|p| p.summary()).collect(),
            exposures: self.exposures.points().map(|p| p.summary()).collect(),
            failures: self.machine.failures().to_vec(),
        }
    }
}
