#![cfg(test)]

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::dependency::{BoundCollection, ExposureDecl, Exposed, InjectionDecl, Injected, Publication};
use crate::event::{EventResult, InstanceEvent, SharedEventDispatcher, WILDCARD};
use crate::kernel::component::{Component, ComponentDefinition};
use crate::kernel::constants::RANKING_KEY;
use crate::kernel::engine::Engine;
use crate::kernel::error::{Error, Result};

// ===== CAPABILITY VALUES =====

/// Value published under the "clock" capability
#[derive(Debug, Clone, PartialEq)]
pub struct ClockFace {
    pub zone: String,
}

/// Value published under the "time" capability
#[derive(Debug, Clone, PartialEq)]
pub struct TimeReport {
    pub zone: String,
}

// ===== COMPONENTS =====

/// Publishes one clock in the zone given by its "zone" property, ranked by
/// its "service.ranking" property
pub struct Clock {
    zone: String,
    ranking: i64,
}

#[async_trait]
impl Component for Clock {}

pub fn clock_type() -> ComponentDefinition<Clock> {
    ComponentDefinition::new("clock", |args| {
        let zone = args
            .properties
            .get("zone")
            .and_then(|v| v.as_str())
            .unwrap_or("utc")
            .to_string();
        let ranking = args
            .properties
            .get(RANKING_KEY)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(Clock { zone, ranking })
    })
    .expose(
        ExposureDecl::new("clock", "clock", |clock: &Clock| {
            Ok(Exposed::One(
                Publication::new(ClockFace {
                    zone: clock.zone.clone(),
                })
                .with_property("zone", clock.zone.clone())
                .with_property(RANKING_KEY, clock.ranking),
            ))
        }),
    )
}

/// Records every bind and unbind it sees and publishes "time" once it has a clock
#[derive(Default)]
pub struct TimeService {
    pub clock: Option<Arc<ClockFace>>,
    pub log: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl Component for TimeService {}

fn face(injected: &Injected) -> Result<Arc<ClockFace>> {
    injected
        .downcast::<ClockFace>()
        .ok_or_else(|| Error::Callback("clock value has the wrong type".to_string()))
}

pub fn time_service_decl() -> InjectionDecl<TimeService> {
    InjectionDecl::method(
        "clock",
        "clock",
        |service: &mut TimeService, injected| {
            let face = face(injected)?;
            service.log.lock().unwrap().push(format!("bind:{}", face.zone));
            service.clock = Some(face);
            Ok(())
        },
        |service: &mut TimeService, injected| {
            let face = face(injected)?;
            service.log.lock().unwrap().push(format!("unbind:{}", face.zone));
            if service.clock.as_ref().is_some_and(|c| c.zone == face.zone) {
                service.clock = None;
            }
            Ok(())
        },
    )
}

fn time_exposure() -> ExposureDecl<TimeService> {
    ExposureDecl::new("time", "time", |service: &TimeService| match &service.clock {
        Some(clock) => Ok(Exposed::One(Publication::new(TimeReport {
            zone: clock.zone.clone(),
        }))),
        None => Ok(Exposed::Nothing),
    })
    .requires("clock")
}

/// TimeService type whose bind log is shared with the caller
pub fn time_service_type(
    type_name: &str,
    decl: InjectionDecl<TimeService>,
    log: Arc<StdMutex<Vec<String>>>,
) -> ComponentDefinition<TimeService> {
    ComponentDefinition::new(type_name, move |_args| {
        Ok(TimeService {
            clock: None,
            log: log.clone(),
        })
    })
    .inject(decl)
    .expose(time_exposure())
}

/// Needs at least two clocks in a collection
#[derive(Default)]
pub struct Quorum {
    pub clocks: BoundCollection,
}

#[async_trait]
impl Component for Quorum {}

pub fn quorum_type() -> ComponentDefinition<Quorum> {
    ComponentDefinition::new("quorum", |_args| Ok(Quorum::default()))
        .inject(InjectionDecl::collection("clocks", "clock", |q: &mut Quorum| &mut q.clocks).minimum(2))
}

// ===== HELPERS =====

pub fn new_log() -> Arc<StdMutex<Vec<String>>> {
    Arc::new(StdMutex::new(Vec::new()))
}

pub fn log_entries(log: &Arc<StdMutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Engine with the clock and default time service types registered
pub async fn standard_engine(log: Arc<StdMutex<Vec<String>>>) -> Engine {
    let engine = Engine::with_local_registry(EngineConfig::default());
    engine.register_type(clock_type()).await.expect("register clock");
    engine
        .register_type(time_service_type("time-service", time_service_decl(), log))
        .await
        .expect("register time service");
    engine
}

/// Collect every event dispatched on `events`
pub async fn record_events(events: &SharedEventDispatcher) -> Arc<Mutex<Vec<InstanceEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    events
        .register_handler(
            WILDCARD,
            Box::new(move |event| {
                let sink = Arc::clone(&sink);
                let event = event.clone();
                Box::pin(async move {
                    sink.lock().await.push(event);
                    EventResult::Continue
                })
            }),
        )
        .await;
    seen
}
