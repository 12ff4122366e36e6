use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dependency::error::ConfigurationError;
use crate::dependency::{ExposureDecl, InjectionDecl, Slot};
use crate::event::SharedEventDispatcher;
use crate::instance::{ComponentInstance, InstanceManager};
use crate::kernel::error::Result;
use crate::lifecycle::FailureRecord;
use crate::registry::{CapabilityRegistry, Filter, Properties};

/// Lifecycle callbacks of a managed component.
///
/// Each callback runs on the instance's own task while the matching
/// transition is fired. Returning an error drives the instance to `FAILED`.
#[async_trait]
pub trait Component: Send + 'static {
    async fn configure(&mut self, _properties: &Properties) -> Result<()> {
        Ok(())
    }

    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Every required injection point is complete
    async fn resolved(&mut self) -> Result<()> {
        Ok(())
    }

    /// Every required exposure point is published
    async fn exposed(&mut self) -> Result<()> {
        Ok(())
    }

    async fn activate(&mut self) -> Result<()> {
        Ok(())
    }

    /// A required injection point was lost
    async fn unresolved(&mut self) -> Result<()> {
        Ok(())
    }

    async fn failed(&mut self, _failure: &FailureRecord) -> Result<()> {
        Ok(())
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What an engine is asked to launch: one specification, one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub properties: Properties,
    /// Per injection point filter, combined with the declared filter
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component_type: component_type.into(),
            properties: Properties::new(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_filter(mut self, point: impl Into<String>, expression: impl Into<String>) -> Self {
        self.filters.insert(point.into(), expression.into());
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidSpecification {
                reason: "specification name must not be empty".to_string(),
            });
        }
        if self.component_type.trim().is_empty() {
            return Err(ConfigurationError::InvalidSpecification {
                reason: format!("specification '{}' names no component type", self.name),
            });
        }
        Ok(())
    }
}

/// Arguments handed to a component constructor
#[derive(Debug, Clone, Default)]
pub struct ConstructorArgs {
    pub properties: Properties,
    pub slots: HashMap<String, Slot>,
}

impl ConstructorArgs {
    /// The slot of a constructor-slot injection point
    pub fn slot(&self, point: &str) -> Option<Slot> {
        self.slots.get(point).cloned()
    }
}

pub type Constructor<C> = Arc<dyn Fn(&ConstructorArgs) -> Result<C> + Send + Sync>;

/// A component type: how to build it and which points it declares
pub struct ComponentDefinition<C> {
    pub(crate) type_name: String,
    pub(crate) constructor: Constructor<C>,
    pub(crate) injections: Vec<InjectionDecl<C>>,
    pub(crate) exposures: Vec<ExposureDecl<C>>,
}

impl<C: Component> ComponentDefinition<C> {
    pub fn new<F>(type_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&ConstructorArgs) -> Result<C> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            constructor: Arc::new(constructor),
            injections: Vec::new(),
            exposures: Vec::new(),
        }
    }

    pub fn inject(mut self, decl: InjectionDecl<C>) -> Self {
        self.injections.push(decl);
        self
    }

    pub fn expose(mut self, decl: ExposureDecl<C>) -> Self {
        self.exposures.push(decl);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn injections(&self) -> &[InjectionDecl<C>] {
        &self.injections
    }

    pub fn exposures(&self) -> &[ExposureDecl<C>] {
        &self.exposures
    }

    /// Validate every declaration and summarize the type.
    pub fn digest(&self) -> Result<TypeDigest> {
        let mut seen = HashSet::new();
        let mut injections = Vec::with_capacity(self.injections.len());
        for decl in &self.injections {
            decl.validate()?;
            if !seen.insert(decl.name.clone()) {
                return Err(ConfigurationError::DuplicatePoint {
                    point: decl.name.clone(),
                }
                .into());
            }
            let filter = Filter::parse(&decl.filter).map_err(|source| ConfigurationError::InvalidFilter {
                point: decl.name.clone(),
                source,
            })?;
            injections.push(PointDigest {
                name: decl.name.clone(),
                capability: decl.capability.clone(),
                filter,
                required: decl.required,
                minimum: decl.minimum,
                multiple: decl.multiple,
            });
        }

        let injection_names: Vec<&str> = self.injections.iter().map(|d| d.name.as_str()).collect();
        let mut exposures = Vec::with_capacity(self.exposures.len());
        for decl in &self.exposures {
            decl.validate(&injection_names)?;
            if !seen.insert(decl.name.clone()) {
                return Err(ConfigurationError::DuplicatePoint {
                    point: decl.name.clone(),
                }
                .into());
            }
            exposures.push(ExposureDigest {
                name: decl.name.clone(),
                capability: decl.capability.clone(),
                requires: decl.requires.clone(),
                required: decl.required,
                persistent: decl.persistent,
            });
        }

        Ok(TypeDigest {
            type_name: self.type_name.clone(),
            injections,
            exposures,
        })
    }
}

impl<C> fmt::Debug for ComponentDefinition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("type_name", &self.type_name)
            .field("injections", &self.injections)
            .field("exposures", &self.exposures)
            .finish_non_exhaustive()
    }
}

/// Validated summary of one injection point declaration
#[derive(Debug, Clone, PartialEq)]
pub struct PointDigest {
    pub name: String,
    pub capability: String,
    pub filter: Filter,
    pub required: bool,
    pub minimum: usize,
    pub multiple: bool,
}

/// Validated summary of one exposure point declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureDigest {
    pub name: String,
    pub capability: String,
    pub requires: Vec<String>,
    pub required: bool,
    pub persistent: bool,
}

/// Validated summary of a component type, cached per type name
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDigest {
    pub type_name: String,
    pub injections: Vec<PointDigest>,
    pub exposures: Vec<ExposureDigest>,
}

impl TypeDigest {
    pub fn injection(&self, name: &str) -> Option<&PointDigest> {
        self.injections.iter().find(|p| p.name == name)
    }

    /// Effective filters for one specification: the declared filter of each
    /// point AND the specification's override for it, if any.
    pub fn resolve_filters(&self, spec: &ComponentSpec) -> Result<HashMap<String, Filter>> {
        for point in spec.filters.keys() {
            if self.injection(point).is_none() {
                return Err(ConfigurationError::UnknownFilterTarget {
                    point: point.clone(),
                }
                .into());
            }
        }
        let mut filters = HashMap::with_capacity(self.injections.len());
        for point in &self.injections {
            let filter = match spec.filters.get(&point.name) {
                Some(expression) => {
                    let extra = Filter::parse(expression).map_err(|source| ConfigurationError::InvalidFilter {
                        point: point.name.clone(),
                        source,
                    })?;
                    point.filter.clone().and(extra)
                }
                None => point.filter.clone(),
            };
            filters.insert(point.name.clone(), filter);
        }
        Ok(filters)
    }
}

/// Everything an instance needs from the engine that launches it
#[derive(Clone)]
pub struct SpawnContext {
    pub registry: Arc<dyn CapabilityRegistry>,
    pub events: SharedEventDispatcher,
    pub retain_by_default: bool,
}

impl fmt::Debug for SpawnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnContext")
            .field("retain_by_default", &self.retain_by_default)
            .finish_non_exhaustive()
    }
}

/// Type-erased component type as stored by the engine
#[async_trait]
pub trait ComponentType: Send + Sync {
    fn type_name(&self) -> &str;

    fn digest(&self) -> Result<TypeDigest>;

    async fn spawn(
        &self,
        spec: ComponentSpec,
        digest: Arc<TypeDigest>,
        context: SpawnContext,
    ) -> Result<ComponentInstance>;
}

#[async_trait]
impl<C: Component> ComponentType for ComponentDefinition<C> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn digest(&self) -> Result<TypeDigest> {
        ComponentDefinition::digest(self)
    }

    async fn spawn(
        &self,
        spec: ComponentSpec,
        digest: Arc<TypeDigest>,
        context: SpawnContext,
    ) -> Result<ComponentInstance> {
        InstanceManager::spawn(self, spec, digest, context).await
    }
}
