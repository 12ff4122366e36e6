/// Application name
pub const APP_NAME: &str = "conduit";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Metadata key carrying the capability name of a provider
pub const CAPABILITY_KEY: &str = "capability";

/// Metadata key carrying the registry-assigned provider id
pub const PROVIDER_ID_KEY: &str = "provider.id";

/// Metadata key used to rank providers when choosing a replacement
pub const RANKING_KEY: &str = "service.ranking";

/// Metadata key carrying the name of the publishing instance
pub const COMPONENT_NAME_KEY: &str = "component.name";

/// Metadata key carrying the type of the publishing instance
pub const COMPONENT_TYPE_KEY: &str = "component.type";

/// Metadata key carrying the exposure point a publication came from
pub const EXPOSURE_POINT_KEY: &str = "exposure.point";

/// Capability under which every instance registers its own handle
pub const COMPONENT_CAPABILITY: &str = "conduit.component";

/// Default number of type digests kept in the declaration cache
pub const DEFAULT_DIGEST_CACHE_CAPACITY: usize = 64;

/// Default upper bound on a single instance shutdown, in milliseconds
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;
