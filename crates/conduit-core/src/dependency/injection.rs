use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, trace, warn};

use crate::dependency::error::ConfigurationError;
use crate::dependency::{DependencyPoint, PointSignal};
use crate::instance::introspection::InjectionSummary;
use crate::kernel::error::{Error, Result};
use crate::registry::{
    CapabilityListener, CapabilityRegistry, CapabilityValue, Filter, ListenerId, ProviderHandle,
    ProviderId,
};

/// What an attach step hands to the component
#[derive(Clone)]
pub enum Injected {
    Value(CapabilityValue),
    Provider(ProviderHandle),
}

impl Injected {
    /// The capability value, fetched through the handle for provider injections
    pub fn value(&self) -> Option<CapabilityValue> {
        match self {
            Injected::Value(value) => Some(value.clone()),
            Injected::Provider(provider) => provider.value(),
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value().and_then(|value| value.downcast::<T>().ok())
    }

    pub fn provider(&self) -> Option<&ProviderHandle> {
        match self {
            Injected::Provider(provider) => Some(provider),
            Injected::Value(_) => None,
        }
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Injected::Value(_) => f.write_str("Injected::Value(..)"),
            Injected::Provider(provider) => write!(f, "Injected::Provider({})", provider.id()),
        }
    }
}

/// Shared cell handed to a component's constructor and filled once a
/// provider is bound.
#[derive(Clone, Default)]
pub struct Slot(Arc<RwLock<Option<Injected>>>);

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Injected> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, injected: Option<Injected>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = injected;
    }

    pub fn is_filled(&self) -> bool {
        self.0.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get().and_then(|injected| injected.downcast::<T>())
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("filled", &self.is_filled()).finish()
    }
}

/// Collection of injected references keyed by provider, in bind order
#[derive(Clone, Default)]
pub struct BoundCollection {
    entries: Vec<(ProviderId, Injected)>,
}

impl BoundCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, provider: ProviderId, injected: Injected) {
        match self.entries.iter_mut().find(|(id, _)| *id == provider) {
            Some(entry) => entry.1 = injected,
            None => self.entries.push((provider, injected)),
        }
    }

    pub fn remove(&mut self, provider: ProviderId) -> Option<Injected> {
        let index = self.entries.iter().position(|(id, _)| *id == provider)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Injected> + '_ {
        self.entries.iter().map(|(_, injected)| injected)
    }

    /// Every entry that downcasts to `T`
    pub fn values_as<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.iter().filter_map(|injected| injected.downcast::<T>()).collect()
    }
}

impl fmt::Debug for BoundCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCollection")
            .field("providers", &self.ids())
            .finish()
    }
}

pub type FieldSetter<C> = Arc<dyn Fn(&mut C, Option<Injected>) -> Result<()> + Send + Sync>;
pub type BindCallback<C> = Arc<dyn Fn(&mut C, &Injected) -> Result<()> + Send + Sync>;
pub type CollectionAccessor<C> =
    Arc<dyn for<'a> Fn(&'a mut C) -> &'a mut BoundCollection + Send + Sync>;

/// How a bound reference reaches the component
pub enum AttachPoint<C> {
    /// Writes `Some` on attach and `None` on detach
    Field(FieldSetter<C>),
    /// Calls `bind` on attach and `unbind` on detach
    Method {
        bind: BindCallback<C>,
        unbind: BindCallback<C>,
    },
    /// Fills a slot the constructor received
    ConstructorSlot(Slot),
    /// Adds to and removes from a keyed collection on the component
    Collection(CollectionAccessor<C>),
}

impl<C> AttachPoint<C> {
    fn attach(&self, component: &mut C, provider: &ProviderHandle, injected: Injected) -> Result<()> {
        match self {
            AttachPoint::Field(set) => set(component, Some(injected)),
            AttachPoint::Method { bind, .. } => bind(component, &injected),
            AttachPoint::ConstructorSlot(slot) => {
                slot.set(Some(injected));
                Ok(())
            }
            AttachPoint::Collection(access) => {
                access(component).insert(provider.id(), injected);
                Ok(())
            }
        }
    }

    fn detach(
        &self,
        component: &mut C,
        provider: &ProviderHandle,
        injected: Option<Injected>,
    ) -> Result<()> {
        match self {
            AttachPoint::Field(set) => set(component, None),
            AttachPoint::Method { unbind, .. } => match injected {
                Some(injected) => unbind(component, &injected),
                None => Err(Error::provider_vanished(provider.capability(), provider.id())),
            },
            AttachPoint::ConstructorSlot(slot) => {
                slot.set(None);
                Ok(())
            }
            AttachPoint::Collection(access) => {
                access(component).remove(provider.id());
                Ok(())
            }
        }
    }

    /// Copy for a new instance. Constructor slots get a new empty cell.
    pub fn fresh(&self) -> Self {
        match self {
            AttachPoint::ConstructorSlot(_) => AttachPoint::ConstructorSlot(Slot::new()),
            other => other.clone(),
        }
    }

    /// Whether attaching a new reference replaces the previous one in place
    pub fn overwrites(&self) -> bool {
        matches!(self, AttachPoint::Field(_) | AttachPoint::ConstructorSlot(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttachPoint::Field(_) => "field",
            AttachPoint::Method { .. } => "method",
            AttachPoint::ConstructorSlot(_) => "constructor-slot",
            AttachPoint::Collection(_) => "collection",
        }
    }

    pub fn slot(&self) -> Option<&Slot> {
        match self {
            AttachPoint::ConstructorSlot(slot) => Some(slot),
            _ => None,
        }
    }
}

impl<C> Clone for AttachPoint<C> {
    fn clone(&self) -> Self {
        match self {
            AttachPoint::Field(set) => AttachPoint::Field(set.clone()),
            AttachPoint::Method { bind, unbind } => AttachPoint::Method {
                bind: bind.clone(),
                unbind: unbind.clone(),
            },
            AttachPoint::ConstructorSlot(slot) => AttachPoint::ConstructorSlot(slot.clone()),
            AttachPoint::Collection(access) => AttachPoint::Collection(access.clone()),
        }
    }
}

impl<C> fmt::Debug for AttachPoint<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttachPoint::{}", self.kind())
    }
}

/// Declared injection point of a component type
pub struct InjectionDecl<C> {
    pub(crate) name: String,
    pub(crate) capability: String,
    pub(crate) filter: String,
    pub(crate) required: bool,
    pub(crate) minimum: usize,
    pub(crate) multiple: bool,
    pub(crate) retain: Option<bool>,
    pub(crate) accept_updates: bool,
    pub(crate) pass_provider: bool,
    pub(crate) replace: bool,
    pub(crate) no_null_gap: bool,
    pub(crate) attach: AttachPoint<C>,
}

impl<C> InjectionDecl<C> {
    fn with_attach(name: impl Into<String>, capability: impl Into<String>, attach: AttachPoint<C>) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            filter: String::new(),
            required: true,
            minimum: 1,
            multiple: false,
            retain: None,
            accept_updates: false,
            pass_provider: false,
            replace: false,
            no_null_gap: false,
            attach,
        }
    }

    /// Single-reference point written through a setter
    pub fn field<F>(name: impl Into<String>, capability: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&mut C, Option<Injected>) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_attach(name, capability, AttachPoint::Field(Arc::new(setter)))
    }

    /// Point driven through bind and unbind callbacks
    pub fn method<B, U>(name: impl Into<String>, capability: impl Into<String>, bind: B, unbind: U) -> Self
    where
        B: Fn(&mut C, &Injected) -> Result<()> + Send + Sync + 'static,
        U: Fn(&mut C, &Injected) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_attach(
            name,
            capability,
            AttachPoint::Method {
                bind: Arc::new(bind),
                unbind: Arc::new(unbind),
            },
        )
    }

    /// Multi-valued point kept in a [`BoundCollection`] on the component
    pub fn collection<F>(name: impl Into<String>, capability: impl Into<String>, accessor: F) -> Self
    where
        F: for<'a> Fn(&'a mut C) -> &'a mut BoundCollection + Send + Sync + 'static,
    {
        let mut decl = Self::with_attach(name, capability, AttachPoint::Collection(Arc::new(accessor)));
        decl.multiple = true;
        decl
    }

    /// Point whose reference lands in a [`Slot`] passed to the constructor
    pub fn constructor_slot(name: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::with_attach(name, capability, AttachPoint::ConstructorSlot(Slot::new()))
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn minimum(mut self, minimum: usize) -> Self {
        self.minimum = minimum;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = Some(retain);
        self
    }

    pub fn accept_updates(mut self) -> Self {
        self.accept_updates = true;
        self
    }

    pub fn pass_provider(mut self) -> Self {
        self.pass_provider = true;
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Replace on loss, attaching the replacement before detaching the lost one
    pub fn replace_without_null_gap(mut self) -> Self {
        self.replace = true;
        self.no_null_gap = true;
        self
    }

    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter = expression.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn minimum_count(&self) -> usize {
        self.minimum
    }

    pub fn attach_point(&self) -> &AttachPoint<C> {
        &self.attach
    }

    /// Static checks that do not depend on any instance
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidCardinality {
            point: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidSpecification {
                reason: "injection point name must not be empty".to_string(),
            });
        }
        if self.capability.trim().is_empty() {
            return Err(ConfigurationError::InvalidSpecification {
                reason: format!("injection point '{}' names no capability", self.name),
            });
        }
        if self.minimum == 0 {
            return Err(invalid("minimum must be at least 1"));
        }
        if !self.multiple && self.minimum > 1 {
            return Err(invalid("a single-valued point cannot require more than one provider"));
        }
        if self.multiple && self.attach.overwrites() {
            return Err(invalid(&format!(
                "a {} point holds a single reference and cannot be multiple",
                self.attach.kind()
            )));
        }
        Ok(())
    }
}

impl<C> Clone for InjectionDecl<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            capability: self.capability.clone(),
            filter: self.filter.clone(),
            required: self.required,
            minimum: self.minimum,
            multiple: self.multiple,
            retain: self.retain,
            accept_updates: self.accept_updates,
            pass_provider: self.pass_provider,
            replace: self.replace,
            no_null_gap: self.no_null_gap,
            attach: self.attach.clone(),
        }
    }
}

impl<C> fmt::Debug for InjectionDecl<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionDecl")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("filter", &self.filter)
            .field("required", &self.required)
            .field("minimum", &self.minimum)
            .field("multiple", &self.multiple)
            .field("attach", &self.attach)
            .finish_non_exhaustive()
    }
}

struct BoundReference {
    provider: ProviderHandle,
    retained: Option<CapabilityValue>,
    attached: bool,
    acquired: bool,
    /// Provider left but its value could not be detached; teardown retries
    departed: bool,
}

impl BoundReference {
    fn is_live_attached(&self) -> bool {
        self.attached && !self.departed
    }
}

/// Live injection point of one instance
pub struct InjectionPoint<C> {
    name: String,
    capability: String,
    filter: Filter,
    required: bool,
    minimum: usize,
    multiple: bool,
    retain: bool,
    accept_updates: bool,
    pass_provider: bool,
    replace: bool,
    no_null_gap: bool,
    attach: AttachPoint<C>,
    bound: Vec<BoundReference>,
    listener: Option<ListenerId>,
    discontinued: bool,
}

impl<C> InjectionPoint<C> {
    /// Build the live point from its declaration. `filter` is the effective
    /// filter (static filter AND any per-instance override); `attach` is the
    /// instance's own copy of the attach point.
    pub fn new(decl: &InjectionDecl<C>, filter: Filter, attach: AttachPoint<C>, retain_by_default: bool) -> Self {
        Self {
            name: decl.name.clone(),
            capability: decl.capability.clone(),
            filter,
            required: decl.required,
            minimum: decl.minimum,
            multiple: decl.multiple,
            retain: decl.retain.unwrap_or(retain_by_default),
            accept_updates: decl.accept_updates,
            pass_provider: decl.pass_provider,
            replace: decl.replace,
            no_null_gap: decl.no_null_gap,
            attach,
            bound: Vec::new(),
            listener: None,
            discontinued: false,
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Number of references currently attached to the component
    pub fn satisfied_count(&self) -> usize {
        self.bound.iter().filter(|r| r.is_live_attached()).count()
    }

    pub fn is_discontinued(&self) -> bool {
        self.discontinued
    }

    /// Stop reacting to provider events; later inject/uninject calls are ignored.
    pub fn discontinue(&mut self) {
        self.discontinued = true;
    }

    /// Attached providers followed by standbys, in bind order
    pub fn bound_ids(&self) -> Vec<ProviderId> {
        self.bound
            .iter()
            .filter(|r| !r.departed)
            .map(|r| r.provider.id())
            .collect()
    }

    pub fn attached_ids(&self) -> Vec<ProviderId> {
        self.bound
            .iter()
            .filter(|r| r.is_live_attached())
            .map(|r| r.provider.id())
            .collect()
    }

    fn signal(&self) -> PointSignal {
        if self.is_complete() {
            PointSignal::Progressed
        } else {
            PointSignal::SetBack
        }
    }

    fn injected_for(&self, provider: &ProviderHandle, value: CapabilityValue) -> Injected {
        if self.pass_provider {
            Injected::Provider(provider.clone())
        } else {
            Injected::Value(value)
        }
    }

    fn position(&self, provider: ProviderId) -> Option<usize> {
        self.bound
            .iter()
            .position(|r| !r.departed && r.provider.id() == provider)
    }

    /// Subscribe to matching providers, then bind the ones already present.
    ///
    /// The listener is registered before the scan so a provider appearing in
    /// between is delivered at least once; duplicates are dropped by id.
    /// Returns the first attach error after trying every present provider.
    pub fn activate(
        &mut self,
        component: &mut C,
        registry: &dyn CapabilityRegistry,
        listener: Arc<dyn CapabilityListener>,
    ) -> Result<PointSignal> {
        let id = registry.listen(&self.capability, self.filter.clone(), listener, false)?;
        self.listener = Some(id);

        let mut present = registry.find(&self.capability, &self.filter)?;
        present.sort_by(|a, b| b.ranking().cmp(&a.ranking()).then(a.id().cmp(&b.id())));
        debug!(
            "Injection point '{}' activated with {} present provider(s) of '{}'",
            self.name,
            present.len(),
            self.capability
        );

        let mut first_error = None;
        for provider in present {
            let Some(value) = provider.value() else {
                continue;
            };
            if let Err(e) = self.inject(component, provider, value, false) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(self.signal()),
        }
    }

    /// Bind a provider (or refresh it when `is_update`).
    pub fn inject(
        &mut self,
        component: &mut C,
        provider: ProviderHandle,
        value: CapabilityValue,
        is_update: bool,
    ) -> Result<PointSignal> {
        if self.discontinued {
            trace!("Point '{}' discontinued, ignoring provider {}", self.name, provider.id());
            return Ok(PointSignal::Unchanged);
        }
        if is_update && !self.accept_updates {
            trace!("Point '{}' does not accept updates, ignoring provider {}", self.name, provider.id());
            return Ok(PointSignal::Unchanged);
        }

        if self.bound.iter().any(|r| r.departed && r.provider.id() == provider.id()) {
            trace!("Point '{}' still detaching provider {}, ignoring", self.name, provider.id());
            return Ok(PointSignal::Unchanged);
        }
        if let Some(index) = self.position(provider.id()) {
            if !is_update {
                debug!("Point '{}' already bound to provider {}", self.name, provider.id());
                return Ok(PointSignal::Unchanged);
            }
            if self.bound[index].attached {
                let injected = self.injected_for(&provider, value.clone());
                self.attach.attach(component, &provider, injected)?;
            }
            if self.retain {
                self.bound[index].retained = Some(value);
            }
            return Ok(PointSignal::Unchanged);
        }

        let attach_now = self.multiple || self.satisfied_count() == 0;
        let mut acquired = false;
        if attach_now {
            let injected = self.injected_for(&provider, value.clone());
            self.attach.attach(component, &provider, injected)?;
            acquired = provider.acquire().is_some();
        }
        trace!(
            "Point '{}' bound provider {} (attached: {})",
            self.name,
            provider.id(),
            attach_now
        );
        self.bound.push(BoundReference {
            provider,
            retained: self.retain.then_some(value),
            attached: attach_now,
            acquired,
            departed: false,
        });
        Ok(self.signal())
    }

    /// Unbind a provider. `value` is what the registry handed out with the
    /// removal, if anything; the provider and the retained copy are tried next.
    pub fn uninject(
        &mut self,
        component: &mut C,
        provider: &ProviderHandle,
        value: Option<CapabilityValue>,
        shutting_down: bool,
    ) -> Result<PointSignal> {
        if self.discontinued {
            return Ok(PointSignal::Unchanged);
        }
        let Some(index) = self.position(provider.id()) else {
            trace!("Point '{}' not bound to provider {}, ignoring removal", self.name, provider.id());
            return Ok(PointSignal::Unchanged);
        };
        if !self.bound[index].attached {
            let standby = self.bound.remove(index);
            if standby.acquired {
                standby.provider.release();
            }
            return Ok(self.signal());
        }

        let lost = self.bound[index].provider.clone();
        let value = value
            .or_else(|| lost.value())
            .or_else(|| self.bound[index].retained.clone());
        let injected = match value.clone() {
            Some(value) => Some(self.injected_for(&lost, value)),
            None if self.pass_provider => Some(Injected::Provider(lost.clone())),
            None => None,
        };

        let replacement = if self.replace && !self.multiple {
            self.pick_replacement()
        } else {
            None
        };

        // The lost reference stays indexed until its value is off the component
        let (detached, result) = match replacement {
            Some((standby, standby_injected)) if self.no_null_gap => {
                match self.attach_standby(component, standby, standby_injected) {
                    Ok(()) if self.attach.overwrites() => (true, Ok(())),
                    Ok(()) => {
                        let detach = self.detach(component, &lost, injected, shutting_down);
                        (detach.is_ok(), detach)
                    }
                    Err(e) => {
                        warn!(
                            "Point '{}' could not attach replacement, detaching provider {}: {}",
                            self.name,
                            lost.id(),
                            e
                        );
                        let detach = self.detach(component, &lost, injected, shutting_down);
                        (detach.is_ok(), detach.and(Err(e)))
                    }
                }
            }
            Some((standby, standby_injected)) => {
                match self.detach(component, &lost, injected, shutting_down) {
                    Ok(()) => (true, self.attach_standby(component, standby, standby_injected)),
                    Err(e) => (false, Err(e)),
                }
            }
            None => {
                let detach = self.detach(component, &lost, injected, shutting_down);
                (detach.is_ok(), detach)
            }
        };

        if detached {
            let reference = self.bound.remove(index);
            if reference.acquired {
                reference.provider.release();
            }
        } else {
            let reference = &mut self.bound[index];
            reference.departed = true;
            if value.is_some() {
                reference.retained = value;
            }
        }
        result?;
        Ok(self.signal())
    }

    /// Attach the best standby when a single-valued point has nothing
    /// attached. Used after a loss that was not replaced in place.
    pub fn rebind(&mut self, component: &mut C) -> Result<PointSignal> {
        if self.discontinued || self.multiple || self.satisfied_count() > 0 {
            return Ok(PointSignal::Unchanged);
        }
        let Some((standby, injected)) = self.pick_replacement() else {
            return Ok(PointSignal::Unchanged);
        };
        self.attach_standby(component, standby, injected)?;
        Ok(self.signal())
    }

    /// Highest ranked standby that still has a value; ties go to the lowest id.
    fn pick_replacement(&self) -> Option<(usize, Injected)> {
        let mut candidates: Vec<usize> = (0..self.bound.len())
            .filter(|&i| !self.bound[i].attached)
            .collect();
        candidates.sort_by(|&a, &b| {
            let (a, b) = (&self.bound[a].provider, &self.bound[b].provider);
            b.ranking().cmp(&a.ranking()).then(a.id().cmp(&b.id()))
        });
        candidates.into_iter().find_map(|i| {
            let reference = &self.bound[i];
            reference
                .provider
                .value()
                .or_else(|| reference.retained.clone())
                .map(|value| (i, self.injected_for(&reference.provider, value)))
        })
    }

    fn attach_standby(&mut self, component: &mut C, index: usize, injected: Injected) -> Result<()> {
        let provider = self.bound[index].provider.clone();
        self.attach.attach(component, &provider, injected)?;
        let reference = &mut self.bound[index];
        reference.attached = true;
        reference.acquired = provider.acquire().is_some();
        debug!("Point '{}' replaced lost provider with {}", self.name, provider.id());
        Ok(())
    }

    fn detach(
        &self,
        component: &mut C,
        provider: &ProviderHandle,
        injected: Option<Injected>,
        shutting_down: bool,
    ) -> Result<()> {
        match self.attach.detach(component, provider, injected) {
            Err(e) if e.is_provider_vanished() => {
                warn!(
                    "Point '{}' could not detach provider {} (shutting down: {}): {}",
                    self.name,
                    provider.id(),
                    shutting_down,
                    e
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Stop listening and detach everything. Detach errors are logged.
    pub fn deactivate(&mut self, component: &mut C, registry: &dyn CapabilityRegistry) {
        if let Some(id) = self.listener.take() {
            if let Err(e) = registry.unlisten(id) {
                warn!("Point '{}' failed to stop listening: {}", self.name, e);
            }
        }
        let bound = std::mem::take(&mut self.bound);
        for reference in bound.into_iter().rev() {
            if reference.attached {
                let injected = reference
                    .provider
                    .value()
                    .or_else(|| reference.retained.clone())
                    .map(|value| self.injected_for(&reference.provider, value));
                if let Err(e) = self.detach(component, &reference.provider, injected, true) {
                    warn!(
                        "Point '{}' failed to detach provider {} during teardown: {}",
                        self.name,
                        reference.provider.id(),
                        e
                    );
                }
            }
            if reference.acquired {
                reference.provider.release();
            }
        }
        self.discontinued = true;
    }

    pub fn summary(&self) -> InjectionSummary {
        InjectionSummary {
            name: self.name.clone(),
            capability: self.capability.clone(),
            filter: self.filter.to_string(),
            required: self.required,
            minimum: self.minimum,
            multiple: self.multiple,
            complete: self.is_complete(),
            bound: self.bound_ids(),
            attached: self.attached_ids(),
        }
    }
}

impl<C> DependencyPoint for InjectionPoint<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> &str {
        &self.capability
    }

    fn is_required(&self) -> bool {
        self.required
    }

    fn is_complete(&self) -> bool {
        self.satisfied_count() >= self.minimum
    }

    fn is_multiple(&self) -> bool {
        self.multiple
    }
}

impl<C> fmt::Debug for InjectionPoint<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("filter", &self.filter.to_string())
            .field("bound", &self.bound_ids())
            .field("discontinued", &self.discontinued)
            .finish()
    }
}
