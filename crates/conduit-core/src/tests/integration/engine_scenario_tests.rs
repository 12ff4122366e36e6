#![cfg(test)]

use async_trait::async_trait;
use serde_json::json;

use crate::dependency::{ExposureDecl, Exposed, InjectionDecl};
use crate::event::InstanceEvent;
use crate::kernel::component::{Component, ComponentDefinition, ComponentSpec};
use crate::kernel::constants::{COMPONENT_CAPABILITY, COMPONENT_NAME_KEY, RANKING_KEY};
use crate::kernel::error::{Error, Result};
use crate::lifecycle::{FailureOrigin, LifecycleState, Transition};
use crate::registry::{CapabilityRegistry, Filter};
use crate::tests::integration::common::{
    log_entries, new_log, quorum_type, record_events, standard_engine, time_service_decl,
    time_service_type,
};

fn clock(name: &str, zone: &str) -> ComponentSpec {
    ComponentSpec::new(name, "clock").with_property("zone", zone)
}

fn ranked_clock(name: &str, zone: &str, ranking: i64) -> ComponentSpec {
    clock(name, zone).with_property(RANKING_KEY, ranking)
}

fn published(registry: &dyn CapabilityRegistry, capability: &str) -> usize {
    registry
        .find(capability, &Filter::Any)
        .expect("find")
        .len()
}

#[tokio::test]
async fn test_clock_and_time_service_round_trip() {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    let registry = engine.registry();

    let service = engine
        .launch(ComponentSpec::new("ts", "time-service"))
        .await
        .expect("launch service");
    assert_eq!(service.lifecycle_state(), LifecycleState::ResolvingDependencies);
    assert_eq!(service.launch().await.expect("launch"), LifecycleState::ResolvingDependencies);

    engine.launch(clock("c1", "utc")).await.expect("launch clock");
    service
        .wait_for_state(LifecycleState::ServicesExposed)
        .await
        .expect("exposed");
    let time = registry
        .find("time", &Filter::parse("(component.name=ts)").expect("filter"))
        .expect("find");
    assert_eq!(time.len(), 1);
    assert_eq!(time[0].property(COMPONENT_NAME_KEY), Some(json!("ts")));

    assert_eq!(service.launch().await.expect("launch"), LifecycleState::Active);

    engine.close("c1").await.expect("close clock");
    service.settle().await.expect("settle");
    assert_eq!(service.lifecycle_state(), LifecycleState::ResolvingDependencies);
    assert_eq!(published(registry.as_ref(), "time"), 0);
    assert_eq!(log_entries(&log), vec!["bind:utc", "unbind:utc"]);

    // A new clock brings it back, but not to ACTIVE on its own
    engine.launch(clock("c2", "cet")).await.expect("launch clock");
    service
        .wait_for_state(LifecycleState::ServicesExposed)
        .await
        .expect("exposed again");
    assert!(service.is_launchable());

    engine.shutdown_all().await.expect("shutdown");
    assert_eq!(service.lifecycle_state(), LifecycleState::Disposed);
    assert_eq!(published(registry.as_ref(), COMPONENT_CAPABILITY), 0);
}

#[tokio::test]
async fn test_collection_waits_for_minimum() {
    let engine = standard_engine(new_log()).await;
    engine.register_type(quorum_type()).await.expect("register");

    let quorum = engine.launch(ComponentSpec::new("q", "quorum")).await.expect("launch");
    engine.launch(clock("c1", "utc")).await.expect("launch");
    quorum.settle().await.expect("settle");
    assert_eq!(quorum.lifecycle_state(), LifecycleState::ResolvingDependencies);

    engine.launch(clock("c2", "cet")).await.expect("launch");
    quorum
        .wait_for_state(LifecycleState::ServicesExposed)
        .await
        .expect("exposed");
    let summary = quorum.describe().await.expect("describe");
    assert_eq!(summary.injection("clocks").expect("clocks").attached.len(), 2);

    engine.close("c2").await.expect("close");
    quorum.settle().await.expect("settle");
    assert_eq!(quorum.lifecycle_state(), LifecycleState::ResolvingDependencies);
}

#[tokio::test]
async fn test_standby_rebinds_after_regression() {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    let registry = engine.registry();

    let service = engine
        .launch(ComponentSpec::new("ts", "time-service"))
        .await
        .expect("launch service");
    engine.launch(clock("c1", "utc")).await.expect("launch");
    service
        .wait_for_state(LifecycleState::ServicesExposed)
        .await
        .expect("exposed");
    engine.launch(clock("c2", "cet")).await.expect("launch");
    service.settle().await.expect("settle");
    assert_eq!(log_entries(&log), vec!["bind:utc"]);

    let seen = record_events(&engine.events()).await;
    engine.close("c1").await.expect("close");
    service.settle().await.expect("settle");
    engine.events().flush().await;

    // Losing the attached clock regresses first, then the standby is attached
    assert_eq!(log_entries(&log), vec!["bind:utc", "unbind:utc", "bind:cet"]);
    let transitions: Vec<(LifecycleState, LifecycleState)> = seen
        .lock()
        .await
        .iter()
        .filter_map(|event| match event {
            InstanceEvent::StateChanged { instance, from, to } if instance == "ts" => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (LifecycleState::ServicesExposed, LifecycleState::ResolvingDependencies),
            (LifecycleState::ResolvingDependencies, LifecycleState::DependenciesResolved),
            (LifecycleState::DependenciesResolved, LifecycleState::ServicesExposed),
        ]
    );
    assert_eq!(service.lifecycle_state(), LifecycleState::ServicesExposed);
    assert_eq!(published(registry.as_ref(), "time"), 1);
    let summary = service.describe().await.expect("describe");
    assert_eq!(summary.injection("clock").expect("clock").attached.len(), 1);

    engine.shutdown_all().await.expect("shutdown");
}

#[tokio::test]
async fn test_retained_reference_replaced_by_best_standby() {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    engine
        .register_type(time_service_type(
            "replacing",
            time_service_decl().retain(true).replace(),
            log.clone(),
        ))
        .await
        .expect("register");

    let service = engine.launch(ComponentSpec::new("ts", "replacing")).await.expect("launch");
    engine.launch(ranked_clock("c1", "a", 0)).await.expect("launch");
    engine.launch(ranked_clock("c2", "b", 1)).await.expect("launch");
    engine.launch(ranked_clock("c3", "c", 5)).await.expect("launch");
    service.settle().await.expect("settle");
    assert_eq!(service.lifecycle_state(), LifecycleState::ServicesExposed);

    engine.close("c1").await.expect("close");
    service.settle().await.expect("settle");
    assert_eq!(log_entries(&log), vec!["bind:a", "unbind:a", "bind:c"]);
    // No regression while a replacement was available
    assert_eq!(service.lifecycle_state(), LifecycleState::ServicesExposed);
    assert!(service.failures().await.expect("failures").is_empty());
}

#[tokio::test]
async fn test_replacement_without_null_gap_binds_before_unbinding() {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    engine
        .register_type(time_service_type(
            "gapless",
            time_service_decl().replace_without_null_gap(),
            log.clone(),
        ))
        .await
        .expect("register");

    engine.launch(clock("c1", "a")).await.expect("launch");
    engine.launch(clock("c2", "b")).await.expect("launch");
    let service = engine.launch(ComponentSpec::new("ts", "gapless")).await.expect("launch");

    engine.close("c1").await.expect("close");
    service.settle().await.expect("settle");
    assert_eq!(log_entries(&log), vec!["bind:a", "bind:b", "unbind:a"]);
}

#[tokio::test]
async fn test_activation_scan_prefers_highest_ranking() {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    engine.launch(ranked_clock("c1", "low", 1)).await.expect("launch");
    engine.launch(ranked_clock("c2", "high", 9)).await.expect("launch");

    let service = engine.launch(ComponentSpec::new("ts", "time-service")).await.expect("launch");
    assert_eq!(service.lifecycle_state(), LifecycleState::ServicesExposed);
    assert_eq!(log_entries(&log), vec!["bind:high"]);
}

#[tokio::test]
async fn test_specification_filter_narrows_providers() {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    let spec = ComponentSpec::new("ts", "time-service").with_filter("clock", "(zone=utc)");
    let service = engine.launch(spec).await.expect("launch");

    engine.launch(clock("c1", "cet")).await.expect("launch");
    service.settle().await.expect("settle");
    assert_eq!(service.lifecycle_state(), LifecycleState::ResolvingDependencies);

    engine.launch(clock("c2", "utc")).await.expect("launch");
    service
        .wait_for_state(LifecycleState::ServicesExposed)
        .await
        .expect("exposed");
    assert_eq!(log_entries(&log), vec!["bind:utc"]);
    let summary = service.describe().await.expect("describe");
    assert_eq!(
        summary.injection("clock").expect("clock").filter,
        "(zone=utc)"
    );
}

#[tokio::test]
async fn test_persistent_exposure_survives_loss() {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    let sticky = ComponentDefinition::new("sticky", move |_args| {
        Ok(crate::tests::integration::common::TimeService::default())
    })
    .inject(time_service_decl())
    .expose(
        ExposureDecl::new("uptime", "uptime", |_s: &crate::tests::integration::common::TimeService| {
            Ok(Exposed::One(crate::dependency::Publication::new(1u64)))
        })
        .requires("clock")
        .persistent(),
    );
    engine.register_type(sticky).await.expect("register");

    let service = engine.launch(ComponentSpec::new("s", "sticky")).await.expect("launch");
    engine.launch(clock("c1", "utc")).await.expect("launch");
    service
        .wait_for_state(LifecycleState::ServicesExposed)
        .await
        .expect("exposed");

    engine.close("c1").await.expect("close");
    service.settle().await.expect("settle");
    assert_eq!(service.lifecycle_state(), LifecycleState::ResolvingDependencies);
    assert_eq!(published(engine.registry().as_ref(), "uptime"), 1);

    service.shutdown().await.expect("shutdown");
    assert_eq!(published(engine.registry().as_ref(), "uptime"), 0);
}

#[tokio::test]
async fn test_optional_injection_does_not_block() {
    let engine = standard_engine(new_log()).await;
    engine
        .register_type(time_service_type(
            "relaxed",
            time_service_decl().optional(),
            new_log(),
        ))
        .await
        .expect("register");
    // The "time" exposure still requires the clock point to be complete
    let service = engine.launch(ComponentSpec::new("r", "relaxed")).await.expect("launch");
    assert_eq!(service.lifecycle_state(), LifecycleState::DependenciesResolved);
    assert!(!service.is_launchable());
}

#[tokio::test]
async fn test_double_shutdown_is_harmless() {
    let engine = standard_engine(new_log()).await;
    let instance = engine.launch(clock("c1", "utc")).await.expect("launch");

    instance.shutdown().await.expect("first shutdown");
    instance.shutdown().await.expect("second shutdown");
    assert_eq!(instance.lifecycle_state(), LifecycleState::Disposed);
    assert!(matches!(instance.describe().await, Err(Error::InstanceGone { .. })));
    // Engine still knows the name; closing it is a no-op
    engine.close("c1").await.expect("close");
}

struct Grumpy {
    refuse: &'static str,
}

#[async_trait]
impl Component for Grumpy {
    async fn configure(&mut self, _properties: &crate::registry::Properties) -> Result<()> {
        if self.refuse == "configure" {
            return Err(Error::Callback("bad settings".to_string()));
        }
        Ok(())
    }

    async fn activate(&mut self) -> Result<()> {
        if self.refuse == "activate" {
            return Err(Error::Callback("will not start".to_string()));
        }
        Ok(())
    }
}

fn grumpy_type() -> ComponentDefinition<Grumpy> {
    ComponentDefinition::new("grumpy", |args| {
        let refuse = match args.properties.get("refuse").and_then(|v| v.as_str()) {
            Some("configure") => "configure",
            Some("activate") => "activate",
            _ => "",
        };
        Ok(Grumpy { refuse })
    })
    .expose(ExposureDecl::new("mood", "mood", |_g: &Grumpy| {
        Ok(Exposed::One(crate::dependency::Publication::new("meh")))
    }))
}

#[tokio::test]
async fn test_failing_activate_withdraws_exposures() {
    let engine = standard_engine(new_log()).await;
    engine.register_type(grumpy_type()).await.expect("register");
    let spec = ComponentSpec::new("g", "grumpy").with_property("refuse", "activate");
    let grumpy = engine.launch(spec).await.expect("launch");
    assert_eq!(published(engine.registry().as_ref(), "mood"), 1);

    assert_eq!(grumpy.launch().await.expect("launch"), LifecycleState::Failed);
    assert_eq!(published(engine.registry().as_ref(), "mood"), 0);
    let failures = grumpy.failures().await.expect("failures");
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].origin,
        FailureOrigin::Transition {
            transition: Transition::Activate
        }
    );
    // FAILED is not launchable
    assert_eq!(grumpy.launch().await.expect("launch"), LifecycleState::Failed);
}

#[tokio::test]
async fn test_failing_configure_comes_up_failed() {
    let engine = standard_engine(new_log()).await;
    engine.register_type(grumpy_type()).await.expect("register");
    let spec = ComponentSpec::new("g", "grumpy").with_property("refuse", "configure");
    let grumpy = engine.launch(spec).await.expect("launch");
    assert_eq!(grumpy.lifecycle_state(), LifecycleState::Failed);
    assert_eq!(published(engine.registry().as_ref(), "mood"), 0);
    engine.close("g").await.expect("close");
    assert_eq!(grumpy.lifecycle_state(), LifecycleState::Disposed);
}

#[tokio::test]
async fn test_required_exposure_with_nothing_fails_instance() {
    let engine = standard_engine(new_log()).await;
    let empty = ComponentDefinition::new("empty", |_args| Ok(Grumpy { refuse: "" }))
        .expose(ExposureDecl::new("mood", "mood", |_g: &Grumpy| Ok(Exposed::Nothing)));
    engine.register_type(empty).await.expect("register");
    let instance = engine.launch(ComponentSpec::new("e", "empty")).await.expect("launch");
    assert_eq!(instance.lifecycle_state(), LifecycleState::Failed);
    let failures = instance.failures().await.expect("failures");
    assert_eq!(
        failures[0].origin,
        FailureOrigin::Exposure {
            point: "mood".to_string()
        }
    );
}

#[tokio::test]
async fn test_constructor_error_is_returned() {
    let engine = standard_engine(new_log()).await;
    let broken = ComponentDefinition::new("broken", |_args| -> Result<Grumpy> {
        Err(Error::Callback("cannot build".to_string()))
    })
    .inject(InjectionDecl::constructor_slot("clock", "clock"));
    engine.register_type(broken).await.expect("register");

    let result = engine.launch(ComponentSpec::new("b", "broken")).await;
    assert!(matches!(result, Err(Error::Callback(_))));
    assert!(engine.instance("b").await.is_none());
    assert_eq!(engine.registry().find(COMPONENT_CAPABILITY, &Filter::Any).expect("find").len(), 0);
}
