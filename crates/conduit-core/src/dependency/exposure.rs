use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::dependency::error::ConfigurationError;
use crate::dependency::{DependencyPoint, PointSignal};
use crate::instance::introspection::ExposureSummary;
use crate::kernel::constants::EXPOSURE_POINT_KEY;
use crate::kernel::error::{Error, Result};
use crate::registry::{CapabilityRegistry, CapabilityValue, Properties, RegistrationHandle};

/// One value to publish, with its own metadata
#[derive(Clone)]
pub struct Publication {
    pub value: CapabilityValue,
    pub properties: Properties,
}

impl Publication {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_value(Arc::new(value))
    }

    pub fn from_value(value: CapabilityValue) -> Self {
        Self {
            value,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for Publication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publication")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// What an exposure resolver hands back
#[derive(Debug, Clone)]
pub enum Exposed {
    Nothing,
    One(Publication),
    Many(Vec<Publication>),
}

pub type ExposureResolver<C> = Arc<dyn Fn(&C) -> Result<Exposed> + Send + Sync>;

/// Declared exposure point of a component type
pub struct ExposureDecl<C> {
    pub(crate) name: String,
    pub(crate) capability: String,
    pub(crate) requires: Vec<String>,
    pub(crate) required: bool,
    pub(crate) persistent: bool,
    pub(crate) multiple: bool,
    pub(crate) properties: Properties,
    pub(crate) resolver: ExposureResolver<C>,
}

impl<C> ExposureDecl<C> {
    pub fn new<F>(name: impl Into<String>, capability: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&C) -> Result<Exposed> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            capability: capability.into(),
            requires: Vec::new(),
            required: true,
            persistent: false,
            multiple: false,
            properties: Properties::new(),
            resolver: Arc::new(resolver),
        }
    }

    /// Add a prerequisite injection point
    pub fn requires(mut self, point: impl Into<String>) -> Self {
        self.requires.push(point.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Keep publishing when a prerequisite is lost
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Allow the resolver to return more than one publication
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.requires
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Check names and that every prerequisite is a declared injection point.
    pub fn validate(&self, injection_names: &[&str]) -> std::result::Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidSpecification {
                reason: "exposure point name must not be empty".to_string(),
            });
        }
        if self.capability.trim().is_empty() {
            return Err(ConfigurationError::InvalidSpecification {
                reason: format!("exposure point '{}' names no capability", self.name),
            });
        }
        for prerequisite in &self.requires {
            if !injection_names.contains(&prerequisite.as_str()) {
                return Err(ConfigurationError::UnknownPrerequisite {
                    point: self.name.clone(),
                    prerequisite: prerequisite.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<C> Clone for ExposureDecl<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            capability: self.capability.clone(),
            requires: self.requires.clone(),
            required: self.required,
            persistent: self.persistent,
            multiple: self.multiple,
            properties: self.properties.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<C> fmt::Debug for ExposureDecl<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposureDecl")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("requires", &self.requires)
            .field("required", &self.required)
            .field("persistent", &self.persistent)
            .field("multiple", &self.multiple)
            .finish_non_exhaustive()
    }
}

/// Live exposure point of one instance
pub struct ExposurePoint<C> {
    name: String,
    capability: String,
    requires: Vec<String>,
    required: bool,
    persistent: bool,
    allow_multiple: bool,
    properties: Properties,
    resolver: ExposureResolver<C>,
    published: Vec<RegistrationHandle>,
}

impl<C> ExposurePoint<C> {
    pub fn new(decl: &ExposureDecl<C>) -> Self {
        Self {
            name: decl.name.clone(),
            capability: decl.capability.clone(),
            requires: decl.requires.clone(),
            required: decl.required,
            persistent: decl.persistent,
            allow_multiple: decl.multiple,
            properties: decl.properties.clone(),
            resolver: decl.resolver.clone(),
            published: Vec::new(),
        }
    }

    /// Prerequisites are a subset of the complete injection points
    pub fn is_ready_to_go(&self, complete: &HashSet<String>) -> bool {
        self.requires.iter().all(|name| complete.contains(name))
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_active(&self) -> bool {
        !self.published.is_empty()
    }

    pub fn prerequisites(&self) -> &[String] {
        &self.requires
    }

    pub fn published(&self) -> &[RegistrationHandle] {
        &self.published
    }

    /// Resolve and publish. `identity` is the instance's own metadata and is
    /// layered between the static properties and each publication's own.
    /// Activating an already active point does nothing.
    pub fn activate(
        &mut self,
        component: &C,
        identity: &Properties,
        registry: &dyn CapabilityRegistry,
    ) -> Result<PointSignal> {
        if self.is_active() {
            return Ok(PointSignal::Unchanged);
        }
        let publications = match (self.resolver)(component)? {
            Exposed::Nothing if self.required => {
                return Err(ConfigurationError::NothingToExpose {
                    point: self.name.clone(),
                }
                .into());
            }
            Exposed::Nothing => return Ok(PointSignal::Unchanged),
            Exposed::One(publication) => vec![publication],
            Exposed::Many(list) if list.is_empty() && self.required => {
                return Err(ConfigurationError::EmptyExposure {
                    point: self.name.clone(),
                }
                .into());
            }
            Exposed::Many(list) if list.is_empty() => return Ok(PointSignal::Unchanged),
            Exposed::Many(list) if list.len() > 1 && !self.allow_multiple => {
                return Err(ConfigurationError::NotMultiple {
                    point: self.name.clone(),
                    count: list.len(),
                }
                .into());
            }
            Exposed::Many(list) => list,
        };

        for publication in publications {
            let mut metadata = self.properties.clone();
            metadata.extend(identity.iter().map(|(k, v)| (k.clone(), v.clone())));
            metadata.extend(publication.properties);
            metadata.insert(
                EXPOSURE_POINT_KEY.to_string(),
                serde_json::Value::from(self.name.clone()),
            );
            match registry.register(&self.capability, publication.value, metadata) {
                Ok(handle) => self.published.push(handle),
                Err(e) => {
                    // Leave nothing half-published
                    if let Err(rollback) = self.deactivate(registry) {
                        warn!("Rollback of exposure point '{}' failed: {}", self.name, rollback);
                    }
                    return Err(e);
                }
            }
        }
        debug!(
            "Exposure point '{}' published {} value(s) of '{}'",
            self.name,
            self.published.len(),
            self.capability
        );
        Ok(PointSignal::Progressed)
    }

    /// Withdraw every publication. All are attempted and the list is always
    /// cleared; the first error is returned.
    pub fn deactivate(&mut self, registry: &dyn CapabilityRegistry) -> Result<()> {
        let mut first_error: Option<Error> = None;
        for handle in self.published.drain(..) {
            if let Err(e) = registry.unregister(&handle) {
                warn!(
                    "Exposure point '{}' failed to withdraw registration {}: {}",
                    self.name, handle.id, e
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn summary(&self) -> ExposureSummary {
        ExposureSummary {
            name: self.name.clone(),
            capability: self.capability.clone(),
            requires: self.requires.clone(),
            required: self.required,
            persistent: self.persistent,
            complete: self.is_complete(),
            published: self.published.clone(),
        }
    }
}

impl<C> DependencyPoint for ExposurePoint<C> {
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
        !self.published.is_empty()
    }

    fn is_multiple(&self) -> bool {
        self.published.len() > 1
    }
}

impl<C> fmt::Debug for ExposurePoint<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExposurePoint")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("requires", &self.requires)
            .field("published", &self.published)
            .finish()
    }
}
