#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use crate::event::{EventResult, InstanceEvent};
use crate::kernel::component::ComponentSpec;
use crate::lifecycle::LifecycleState;
use crate::tests::integration::common::{new_log, record_events, standard_engine};

use LifecycleState::*;

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let engine = standard_engine(new_log()).await;
    let seen = record_events(&engine.events()).await;

    let clock = engine
        .launch(ComponentSpec::new("c1", "clock"))
        .await
        .expect("launch");
    clock.launch().await.expect("activate");
    engine.close("c1").await.expect("close");
    engine.events().flush().await;

    let seen = seen.lock().await;
    let transitions: Vec<(LifecycleState, LifecycleState)> = seen
        .iter()
        .filter_map(|event| match event {
            InstanceEvent::StateChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (Newborn, Configured),
            (Configured, ResolvingDependencies),
            (ResolvingDependencies, DependenciesResolved),
            (DependenciesResolved, ServicesExposed),
            (ServicesExposed, Active),
            (Active, Disposed),
        ]
    );
    assert!(seen.iter().all(|e| e.instance() == "c1"));
    assert!(matches!(seen.last(), Some(InstanceEvent::Disposed { .. })));
    let launchable = seen
        .iter()
        .position(|e| matches!(e, InstanceEvent::Launchable { .. }))
        .expect("launchable event");
    let exposed = seen
        .iter()
        .position(|e| matches!(e, InstanceEvent::StateChanged { to: ServicesExposed, .. }))
        .expect("exposed event");
    assert_eq!(launchable, exposed + 1);
}

#[tokio::test]
async fn test_regression_is_reported() {
    let engine = standard_engine(new_log()).await;
    let service = engine
        .launch(ComponentSpec::new("ts", "time-service"))
        .await
        .expect("launch");
    engine
        .launch(ComponentSpec::new("c1", "clock"))
        .await
        .expect("launch");
    service.wait_for_state(ServicesExposed).await.expect("exposed");

    let seen = record_events(&engine.events()).await;
    engine.close("c1").await.expect("close");
    service.settle().await.expect("settle");
    engine.events().flush().await;

    let seen = seen.lock().await;
    assert!(seen.iter().any(|e| matches!(
        e,
        InstanceEvent::StateChanged { instance, from: ServicesExposed, to: ResolvingDependencies }
            if instance == "ts"
    )));
}

#[tokio::test]
async fn test_observer_can_launch_from_launchable_event() {
    let engine = Arc::new(standard_engine(new_log()).await);
    let observer = Arc::clone(&engine);
    engine
        .events()
        .register_handler(
            "instance.launchable",
            Box::new(move |event| {
                let engine = Arc::clone(&observer);
                let name = event.instance().to_string();
                Box::pin(async move {
                    if let Some(instance) = engine.instance(&name).await {
                        instance.launch().await.expect("launch from observer");
                    }
                    EventResult::Continue
                })
            }),
        )
        .await;

    let service = engine
        .launch(ComponentSpec::new("ts", "time-service"))
        .await
        .expect("launch");
    engine
        .launch(ComponentSpec::new("c1", "clock"))
        .await
        .expect("launch");

    tokio::time::timeout(Duration::from_secs(3), service.wait_for_state(Active))
        .await
        .expect("observer launch reached ACTIVE")
        .expect("instance alive");

    // The instance queue keeps serving provider events afterwards
    engine.close("c1").await.expect("close");
    service.settle().await.expect("settle");
    assert_eq!(service.lifecycle_state(), ResolvingDependencies);
}
