//! # Conduit Lifecycle
//!
//! The per-instance lifecycle state machine.
//!
//! ```text
//! CONFIGURE          NEWBORN                -> CONFIGURED
//! INITIALIZE         CONFIGURED             -> RESOLVING_DEPENDENCIES
//! BECOME_RESOLVED    RESOLVING_DEPENDENCIES -> DEPENDENCIES_RESOLVED
//! COMPLETE_EXPOSURE  DEPENDENCIES_RESOLVED  -> SERVICES_EXPOSED
//! ACTIVATE           SERVICES_EXPOSED       -> ACTIVE
//! BECOME_UNRESOLVED  DEPENDENCIES_RESOLVED | SERVICES_EXPOSED | ACTIVE
//!                                           -> RESOLVING_DEPENDENCIES
//! FAIL               any                    -> FAILED
//! DISPOSE            any                    -> DISPOSED
//! ```
pub mod error;
pub mod machine;
pub mod state;

pub use error::LifecycleError;
pub use machine::{
    FailureOrigin, FailureRecord, InstanceStatus, LifecycleStateMachine, TransitionOutcome,
};
pub use state::{LifecycleState, Transition};
