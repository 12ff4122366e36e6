//! # Conduit Dependency Points
//!
//! The two roles a component declares dependencies in:
//!
//! - **Injection points** ([`InjectionPoint`]) bind a capability published by
//!   someone else onto the live component, following cardinality, retention
//!   and replacement policy.
//! - **Exposure points** ([`ExposurePoint`]) publish a capability of the
//!   component itself once their prerequisite injection points are complete.
//!
//! Each role is indexed by a [`DependencyTracker`], which folds the
//! completeness of many points into the readiness predicates the lifecycle
//! driver acts on.
pub mod error;
pub mod exposure;
pub mod injection;
pub mod tracker;

pub use error::{ConfigurationError, DependencyError};
pub use exposure::{ExposureDecl, ExposurePoint, Exposed, Publication};
pub use injection::{
    AttachPoint, BoundCollection, InjectionDecl, InjectionPoint, Injected, Slot,
};
pub use tracker::DependencyTracker;

/// Common view of a named dependency point, as seen by its tracker
pub trait DependencyPoint {
    fn name(&self) -> &str;
    fn capability(&self) -> &str;
    fn is_required(&self) -> bool;
    fn is_complete(&self) -> bool;
    fn is_multiple(&self) -> bool;
}

/// What a point reports back after handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointSignal {
    /// The point is complete after the event
    Progressed,
    /// The point is incomplete after the event
    SetBack,
    /// The event did not affect the point
    Unchanged,
}
