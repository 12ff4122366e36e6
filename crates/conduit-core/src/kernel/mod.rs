//! # Conduit Core Kernel
//!
//! The `kernel` module holds what ties the engine together.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Engine**: [`Engine`](engine::Engine) owns the component type table,
//!   the declaration digest cache, the event dispatcher and all live instances.
//! - **Component Model**: the [`Component`](component::Component) callback
//!   trait, [`ComponentSpec`](component::ComponentSpec) and
//!   [`ComponentDefinition`](component::ComponentDefinition), in the
//!   `component` submodule.
//! - **Digest Cache**: a size-bounded LRU cache of validated type digests in
//!   the `cache` submodule.
//! - **Core Constants**: metadata keys and defaults in `constants`.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and `Result`
//!   alias in `error`.
pub mod cache;
pub mod component;
pub mod constants;
pub mod engine;
pub mod error;

pub use cache::{CacheStats, DeclarationCache, LruCache};
pub use component::{
    Component, ComponentDefinition, ComponentSpec, ComponentType, ConstructorArgs, TypeDigest,
};
pub use engine::Engine;
pub use error::{Error, Result};
// Test module declaration
#[cfg(test)]
mod tests;
