use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::info;

use conduit_core::dependency::{ExposureDecl, Exposed, InjectionDecl, Injected, Publication};
use conduit_core::kernel::constants::RANKING_KEY;
use conduit_core::{
    Component, ComponentDefinition, ComponentInstance, ComponentSpec, Engine, EngineConfig, Error,
    Filter, LifecycleState, Result,
};

/// Value a Clock publishes under "clock"
#[derive(Debug)]
pub struct ClockFace {
    pub owner: String,
}

/// Value a TimeService publishes under "time"
#[derive(Debug)]
pub struct TimeReport {
    pub source: String,
}

struct Clock {
    owner: String,
    ranking: i64,
}

#[async_trait]
impl Component for Clock {}

fn clock_type() -> ComponentDefinition<Clock> {
    ComponentDefinition::new("clock", |args| {
        let owner = args
            .properties
            .get("owner")
            .and_then(|v| v.as_str())
            .unwrap_or("clock")
            .to_string();
        let ranking = args
            .properties
            .get(RANKING_KEY)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(Clock { owner, ranking })
    })
    .expose(ExposureDecl::new("clock", "clock", |clock: &Clock| {
        Ok(Exposed::One(
            Publication::new(ClockFace {
                owner: clock.owner.clone(),
            })
            .with_property(RANKING_KEY, clock.ranking),
        ))
    }))
}

/// Bound clock of a TimeService, shared so the demo can print it
type Binding = Arc<Mutex<Option<String>>>;

struct TimeService {
    clock: Binding,
}

#[async_trait]
impl Component for TimeService {
    async fn activate(&mut self) -> Result<()> {
        info!("Time service active");
        Ok(())
    }
}

fn owner_of(injected: &Injected) -> Result<String> {
    injected
        .downcast::<ClockFace>()
        .map(|face| face.owner.clone())
        .ok_or_else(|| Error::Callback("bound value is not a clock".to_string()))
}

fn time_service_type(binding: Binding, replace: bool) -> ComponentDefinition<TimeService> {
    let mut clock = InjectionDecl::method(
        "clock",
        "clock",
        |service: &mut TimeService, injected| {
            let owner = owner_of(injected)?;
            println!("time-service: bound {}", owner);
            *service.clock.lock().unwrap_or_else(PoisonError::into_inner) = Some(owner);
            Ok(())
        },
        |service: &mut TimeService, injected| {
            let owner = owner_of(injected)?;
            println!("time-service: unbound {}", owner);
            let mut current = service.clock.lock().unwrap_or_else(PoisonError::into_inner);
            if current.as_deref() == Some(owner.as_str()) {
                *current = None;
            }
            Ok(())
        },
    );
    if replace {
        clock = clock.retain(true).replace();
    }

    ComponentDefinition::new("time-service", move |_args| {
        Ok(TimeService {
            clock: binding.clone(),
        })
    })
    .inject(clock)
    .expose(
        ExposureDecl::new("time", "time", |service: &TimeService| {
            let source = service
                .clock
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .unwrap_or_default();
            Ok(Exposed::One(Publication::new(TimeReport { source })))
        })
        .requires("clock"),
    )
}

fn report(instance: &ComponentInstance) {
    println!("{}: {}", instance.name(), instance.lifecycle_state());
}

fn published_time(engine: &Engine) -> Result<usize> {
    Ok(engine.registry().find("time", &Filter::Any)?.len())
}

/// Run the Clock/TimeService scenario, printing every step to stdout.
///
/// With `replace`, a second clock is started before the first one stops and
/// the time service switches over without leaving its state.
pub async fn run(config: EngineConfig, replace: bool) -> Result<()> {
    let engine = Engine::with_local_registry(config);
    let binding: Binding = Arc::new(Mutex::new(None));
    engine.register_type(clock_type()).await?;
    engine.register_type(time_service_type(binding.clone(), replace)).await?;

    let service = engine.launch(ComponentSpec::new("time-service", "time-service")).await?;
    report(&service);

    let first = engine
        .launch(
            ComponentSpec::new("clock-1", "clock")
                .with_property("owner", "clock-1")
                .with_property(RANKING_KEY, 1),
        )
        .await?;
    first.launch().await?;
    report(&first);
    service.wait_for_state(LifecycleState::ServicesExposed).await?;
    report(&service);
    println!("time published: {}", published_time(&engine)?);

    service.launch().await?;
    report(&service);

    if replace {
        let second = engine
            .launch(ComponentSpec::new("clock-2", "clock").with_property("owner", "clock-2"))
            .await?;
        second.launch().await?;
        report(&second);
    }

    engine.close("clock-1").await?;
    report(&first);
    service.settle().await?;
    report(&service);
    let bound = binding.lock().unwrap_or_else(PoisonError::into_inner).clone();
    println!("time-service clock: {}", bound.as_deref().unwrap_or("none"));
    println!("time published: {}", published_time(&engine)?);

    engine.shutdown_all().await?;
    report(&service);
    Ok(())
}
