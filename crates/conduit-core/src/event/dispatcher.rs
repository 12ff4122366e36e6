use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex; // Use tokio's Mutex
use tokio::sync::{mpsc, oneshot};

use log::warn;

use async_trait::async_trait;
use crate::event::{AsyncEventHandler, EventId, EventResult, InstanceEvent, WILDCARD};

// This type represents an owned future that returns EventResult
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = EventResult> + Send + 'a>>;

/// Boxed handler closure as stored by the dispatcher
pub type HandlerFn = Box<dyn Fn(&InstanceEvent) -> BoxFuture<'_> + Send + Sync>;

//--------------------------------------------------
// EventDispatcher (Internal, wrapped by SharedEventDispatcher)
//--------------------------------------------------

/// Event dispatcher for managing and dispatching events (Internal Implementation)
pub struct EventDispatcher {
    handlers: HashMap<&'static str, Vec<(EventId, Arc<dyn AsyncEventHandler>)>>,
    next_handler_id: EventId,
}

// Manual Debug implementation for EventDispatcher
impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handler_count: usize = self.handlers.values().map(|v| v.len()).sum();
        f.debug_struct("EventDispatcher")
         .field("handlers_count", &handler_count)
         .field("next_handler_id", &self.next_handler_id)
         .finish()
    }
}

/// Simple handler wrapping a closure (Internal Helper)
struct SimpleHandler {
    handler: HandlerFn,
}
impl fmt::Debug for SimpleHandler {
     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_struct("SimpleHandler").finish_non_exhaustive() }
}
#[async_trait]
impl AsyncEventHandler for SimpleHandler {
    async fn handle(&self, event: &InstanceEvent) -> EventResult { (self.handler)(event).await }
}

// Single implementation block for EventDispatcher
impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_handler_id: 1,
        }
    }

    /// Register a handler for one event name, or [`WILDCARD`] for all of them
    pub fn register_handler(&mut self, event_name: &'static str, handler: HandlerFn) -> EventId {
        let id = self.next_handler_id; self.next_handler_id += 1;
        let handler = SimpleHandler { handler };
        self.handlers.entry(event_name).or_default().push((id, Arc::new(handler)));
        id
    }

    pub fn unregister_handler(&mut self, id: EventId) -> bool {
        let mut found = false;
        self.handlers.values_mut().for_each(|handlers| {
            let len_before = handlers.len(); handlers.retain(|(h_id, _)| *h_id != id);
            if handlers.len() < len_before { found = true; }
        });
        found
    }

    /// Handlers interested in `event`, specific names before wildcards, each
    /// group in registration order
    pub fn handlers_for(&self, event: &InstanceEvent) -> Vec<Arc<dyn AsyncEventHandler>> {
        let named = self.handlers.get(event.name()).into_iter().flatten();
        let wildcard = self.handlers.get(WILDCARD).into_iter().flatten();
        named.chain(wildcard).map(|(_, handler)| handler.clone()).collect()
    }

    pub async fn dispatch_internal(&self, event: &InstanceEvent) -> EventResult {
        run_handlers(self.handlers_for(event), event).await
    }

    pub fn handler_count(&self) -> usize { self.handlers.values().map(|v| v.len()).sum() }
}

impl Default for EventDispatcher { fn default() -> Self { Self::new() } }

async fn run_handlers(handlers: Vec<Arc<dyn AsyncEventHandler>>, event: &InstanceEvent) -> EventResult {
    for handler in handlers {
        if handler.handle(event).await == EventResult::Stop {
            return EventResult::Stop;
        }
    }
    EventResult::Continue
}


//--------------------------------------------------
// SharedEventDispatcher (Public API)
//--------------------------------------------------

/// Work item of the delivery task
enum Queued {
    Event(InstanceEvent),
    Flush(oneshot::Sender<()>),
}

/// Thread-safe shared event dispatcher using Tokio Mutex.
///
/// Events can be dispatched inline with [`dispatch`](Self::dispatch) or
/// handed to a delivery task with [`publish`](Self::publish). Published
/// events reach handlers in publish order.
#[derive(Clone)] // Only Clone
pub struct SharedEventDispatcher {
    dispatcher: Arc<Mutex<EventDispatcher>>,
    queue: Arc<OnceLock<mpsc::UnboundedSender<Queued>>>,
}

// Manual Debug impl for SharedEventDispatcher
impl fmt::Debug for SharedEventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEventDispatcher").finish_non_exhaustive()
    }
}

// Single implementation block for SharedEventDispatcher
impl SharedEventDispatcher {
    pub fn new() -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(EventDispatcher::new())),
            queue: Arc::new(OnceLock::new()),
        }
    }

    /// Queue `event` for delivery and return at once. Handlers run on the
    /// delivery task, so they may call back into the instance that published.
    pub fn publish(&self, event: InstanceEvent) {
        let Some(queue) = self.delivery_queue() else {
            warn!("No tokio runtime, dropping event {}", event.name());
            return;
        };
        if queue.send(Queued::Event(event)).is_err() {
            warn!("Event delivery task stopped");
        }
    }

    /// Resolves once every event published before this call was delivered.
    /// Must not be awaited from inside a handler.
    pub async fn flush(&self) {
        let Some(queue) = self.queue.get() else {
            return;
        };
        let (done, delivered) = oneshot::channel();
        if queue.send(Queued::Flush(done)).is_ok() {
            let _ = delivered.await;
        }
    }

    fn delivery_queue(&self) -> Option<&mpsc::UnboundedSender<Queued>> {
        if let Some(queue) = self.queue.get() {
            return Some(queue);
        }
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        Some(self.queue.get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            runtime.spawn(deliver(Arc::clone(&self.dispatcher), receiver));
            sender
        }))
    }

    /// Dispatch to a snapshot of the handlers. The lock is released before any
    /// handler runs, so handlers may register or unregister handlers.
    pub async fn dispatch(&self, event: &InstanceEvent) -> EventResult {
        let handlers = {
            let dispatcher = self.dispatcher.lock().await;
            dispatcher.handlers_for(event)
        };
        run_handlers(handlers, event).await
    }

    pub async fn register_handler(&self, event_name: &'static str, handler: HandlerFn) -> EventId {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.register_handler(event_name, handler)
    }

    pub async fn unregister_handler(&self, id: EventId) -> bool {
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.unregister_handler(id)
    }

    pub async fn handler_count(&self) -> usize {
        self.dispatcher.lock().await.handler_count()
    }
}

impl Default for SharedEventDispatcher { fn default() -> Self { Self::new() } }

/// Runs until every clone of the owning dispatcher is gone
async fn deliver(dispatcher: Arc<Mutex<EventDispatcher>>, mut receiver: mpsc::UnboundedReceiver<Queued>) {
    while let Some(item) = receiver.recv().await {
        match item {
            Queued::Event(event) => {
                let handlers = dispatcher.lock().await.handlers_for(&event);
                run_handlers(handlers, &event).await;
            }
            Queued::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

//--------------------------------------------------
// Helper Functions
//--------------------------------------------------

/// Helper function to create synchronous handlers that are compatible with async system
pub fn sync_event_handler<F>(f: F) -> HandlerFn
where F: Fn(&InstanceEvent) -> EventResult + Send + Sync + 'static {
    Box::new(move |event| { let result = f(event); Box::pin(async move { result }) })
}
