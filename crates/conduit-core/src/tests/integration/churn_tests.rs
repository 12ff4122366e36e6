#![cfg(test)]

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;
use serde_json::json;

use crate::dependency::InjectionDecl;
use crate::kernel::component::ComponentSpec;
use crate::kernel::constants::RANKING_KEY;
use crate::kernel::error::Error;
use crate::lifecycle::LifecycleState;
use crate::registry::{Properties, RegistrationHandle};
use crate::tests::integration::common::{
    ClockFace, TimeService, new_log, standard_engine, time_service_decl, time_service_type,
};

async fn churn_keeps_invariants(type_name: &str, decl: InjectionDecl<TimeService>) {
    let log = new_log();
    let engine = standard_engine(log.clone()).await;
    engine
        .register_type(time_service_type(type_name, decl, log))
        .await
        .expect("register");
    let service = engine
        .launch(ComponentSpec::new("ts", type_name))
        .await
        .expect("launch");
    let registry = engine.registry();

    let mut rng = rand::thread_rng();
    let mut live: BTreeMap<u64, RegistrationHandle> = BTreeMap::new();
    for step in 0..200 {
        let add = live.is_empty() || (live.len() < 6 && rng.gen_bool(0.55));
        if add {
            let mut props = Properties::new();
            props.insert(RANKING_KEY.to_string(), json!(rng.gen_range(-3i64..=3)));
            props.insert("zone".to_string(), json!(format!("z{}", step)));
            let handle = registry
                .register(
                    "clock",
                    Arc::new(ClockFace {
                        zone: format!("z{}", step),
                    }),
                    props,
                )
                .expect("register");
            live.insert(handle.id, handle);
        } else {
            let index = rng.gen_range(0..live.len());
            let id = *live.keys().nth(index).expect("live provider");
            let handle = live.remove(&id).expect("live provider");
            registry.unregister(&handle).expect("unregister");
        }

        service.settle().await.expect("settle");
        let summary = service.describe().await.expect("describe");
        let clock = summary.injection("clock").expect("clock point");

        let mut bound = clock.bound.clone();
        bound.sort_unstable();
        let expected: Vec<u64> = live.keys().copied().collect();
        assert_eq!(bound, expected, "step {}", step);
        assert_eq!(clock.attached.len(), usize::from(!live.is_empty()), "step {}", step);
        assert_eq!(clock.complete, !live.is_empty(), "step {}", step);

        let state = service.lifecycle_state();
        if live.is_empty() {
            assert_eq!(state, LifecycleState::ResolvingDependencies, "step {}", step);
        } else {
            assert_eq!(state, LifecycleState::ServicesExposed, "step {}", step);
        }
        assert!(summary.failures.is_empty(), "step {}", step);
    }
    engine.shutdown_all().await.expect("shutdown");
}

#[tokio::test]
async fn test_random_provider_churn_keeps_invariants() {
    churn_keeps_invariants("replacing", time_service_decl().replace()).await;
}

#[tokio::test]
async fn test_random_provider_churn_rebinds_standbys() {
    churn_keeps_invariants("rebinding", time_service_decl()).await;
}

#[tokio::test]
async fn test_concurrent_launches() {
    let engine = standard_engine(new_log()).await;
    engine
        .launch(ComponentSpec::new("c1", "clock"))
        .await
        .expect("launch clock");

    let launches = (0..8).map(|i| engine.launch(ComponentSpec::new(format!("ts-{}", i), "time-service")));
    let instances: Vec<_> = join_all(launches)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("all launched");

    for instance in &instances {
        instance.settle().await.expect("settle");
        assert_eq!(instance.lifecycle_state(), LifecycleState::ServicesExposed);
    }
    assert_eq!(engine.instance_names().await.len(), 9);
    engine.shutdown_all().await.expect("shutdown");
}

#[tokio::test]
async fn test_concurrent_launches_of_one_name() {
    let engine = standard_engine(new_log()).await;
    let launches = (0..4).map(|_| engine.launch(ComponentSpec::new("c1", "clock")));
    let results = join_all(launches).await;

    let launched = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(launched, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::DuplicateInstance { .. })));
    assert_eq!(engine.instance_names().await, vec!["c1"]);
}
