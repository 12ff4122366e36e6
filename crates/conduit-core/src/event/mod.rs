//! # Conduit Event System
//!
//! Observer hook through which running instances report what happens to them:
//! applied transitions, recorded failures, launchability and disposal.
//!
//! Handlers register against an event name (see [`InstanceEvent::name`]) or
//! against [`WILDCARD`] to receive everything. Dispatch is asynchronous and
//! handlers run in registration order; a handler returning
//! [`EventResult::Stop`] ends propagation for that event.
pub mod dispatcher;
pub mod types;

use async_trait::async_trait;

/// Type for handler identifiers
pub type EventId = u64;

/// Handler name that receives every event
pub const WILDCARD: &str = "*";

/// Result of event processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Event was processed and propagation should continue
    Continue,
    /// Event was processed and propagation should stop
    Stop,
}

/// Asynchronous event handler trait
#[async_trait]
pub trait AsyncEventHandler: Send + Sync {
    async fn handle(&self, event: &InstanceEvent) -> EventResult;
}

/// Re-export important types
pub use dispatcher::{BoxFuture, EventDispatcher, HandlerFn, SharedEventDispatcher, sync_event_handler};
pub use types::InstanceEvent;
