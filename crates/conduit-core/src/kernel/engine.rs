use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::event::SharedEventDispatcher;
use crate::instance::{ComponentInstance, InstanceSummary};
use crate::kernel::cache::{CacheStats, DeclarationCache};
use crate::kernel::component::{Component, ComponentDefinition, ComponentSpec, ComponentType, SpawnContext};
use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::registry::{CapabilityRegistry, LocalCapabilityRegistry};

/// Drives component instances: holds the type table, the digest cache, the
/// event dispatcher and every live instance keyed by specification name.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<dyn CapabilityRegistry>,
    types: Mutex<HashMap<String, Arc<dyn ComponentType>>>,
    digests: Mutex<DeclarationCache>,
    instances: Mutex<BTreeMap<String, ComponentInstance>>,
    events: SharedEventDispatcher,
}

impl Engine {
    pub fn new(config: EngineConfig, registry: Arc<dyn CapabilityRegistry>) -> Self {
        info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        let digests = DeclarationCache::new(config.digest_cache_capacity);
        Self {
            config,
            registry,
            types: Mutex::new(HashMap::new()),
            digests: Mutex::new(digests),
            instances: Mutex::new(BTreeMap::new()),
            events: SharedEventDispatcher::new(),
        }
    }

    /// Engine backed by a fresh [`LocalCapabilityRegistry`]
    pub fn with_local_registry(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(LocalCapabilityRegistry::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<dyn CapabilityRegistry> {
        self.registry.clone()
    }

    pub fn events(&self) -> SharedEventDispatcher {
        self.events.clone()
    }

    /// Add a component type. Declarations are validated here; a type name can
    /// only be registered once.
    pub async fn register_type<C: Component>(&self, definition: ComponentDefinition<C>) -> Result<()> {
        let type_name = definition.type_name().to_string();
        let digest = Arc::new(definition.digest()?);
        let mut types = self.types.lock().await;
        if types.contains_key(&type_name) {
            return Err(Error::DuplicateComponentType { type_name });
        }
        types.insert(type_name.clone(), Arc::new(definition));
        self.digests.lock().await.insert(type_name.clone(), digest);
        debug!("Registered component type '{}'", type_name);
        Ok(())
    }

    pub async fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate `spec`. One specification name maps to one live instance.
    pub async fn launch(&self, spec: ComponentSpec) -> Result<ComponentInstance> {
        spec.validate()?;
        let component_type = self
            .types
            .lock()
            .await
            .get(&spec.component_type)
            .cloned()
            .ok_or_else(|| Error::UnknownComponentType {
                type_name: spec.component_type.clone(),
            })?;
        if self.instances.lock().await.contains_key(&spec.name) {
            return Err(Error::DuplicateInstance { name: spec.name });
        }

        let digest = self
            .digests
            .lock()
            .await
            .get_or_try_insert_with(spec.component_type.clone(), || {
                component_type.digest().map(Arc::new)
            })?;

        let name = spec.name.clone();
        let context = SpawnContext {
            registry: self.registry.clone(),
            events: self.events.clone(),
            retain_by_default: self.config.retain_references_by_default,
        };
        let instance = component_type.spawn(spec, digest, context).await?;

        let mut instances = self.instances.lock().await;
        if instances.contains_key(&name) {
            // Lost a race with a concurrent launch of the same name
            drop(instances);
            instance.shutdown().await?;
            return Err(Error::DuplicateInstance { name });
        }
        instances.insert(name.clone(), instance.clone());
        info!("Launched instance '{}' ({})", name, instance.lifecycle_state());
        Ok(instance)
    }

    /// Shut an instance down and forget it.
    pub async fn close(&self, name: &str) -> Result<()> {
        let instance = self
            .instances
            .lock()
            .await
            .remove(name)
            .ok_or_else(|| Error::UnknownInstance {
                name: name.to_string(),
            })?;
        match tokio::time::timeout(self.config.shutdown_timeout(), instance.shutdown()).await {
            Ok(result) => result,
            Err(_) => Err(Error::ShutdownTimedOut {
                name: name.to_string(),
                timeout_ms: self.config.shutdown_timeout_ms,
            }),
        }
    }

    pub async fn instance(&self, name: &str) -> Option<ComponentInstance> {
        self.instances.lock().await.get(name).cloned()
    }

    pub async fn instance_names(&self) -> Vec<String> {
        self.instances.lock().await.keys().cloned().collect()
    }

    pub async fn describe_all(&self) -> Result<Vec<InstanceSummary>> {
        let instances: Vec<ComponentInstance> = self.instances.lock().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(instances.len());
        for instance in instances {
            summaries.push(instance.describe().await?);
        }
        Ok(summaries)
    }

    /// Close every instance. All are attempted; the first error is returned.
    pub async fn shutdown_all(&self) -> Result<()> {
        let names = self.instance_names().await;
        info!("Shutting down {} instance(s)", names.len());
        let mut first_error = None;
        for name in names.iter().rev() {
            if let Err(e) = self.close(name).await {
                warn!("Failed to close instance '{}': {}", name, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.digests.lock().await.stats()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
