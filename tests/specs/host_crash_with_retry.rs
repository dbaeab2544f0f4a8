//! spec.md §8 scenario 6: a `sleep(10)` action runs on a host that
//! crashes at `t=1`.
//!
//! With `FAIL_ACTION_AFTER_ACTION_EXECUTOR_CRASH=true`, the action ends
//! FAILED with `HostError` and the job ends DISCONTINUED. With the
//! default (retry-enabled) policy, restarting the host at `t=2` lets the
//! action succeed at `t=12`, and its `execution_history` carries both the
//! failed attempt and the completed one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as PLMutex;
use wrench_core::{
    Action, ActionKind, ActionState, CompoundJob, CompoundJobState, FailureCause, PropertyMap,
};
use wrench_kernel::{CommPort, PlatformBuilder, SimClock};
use wrench_services::storage_directory::StorageDirectory;
use wrench_services::BareMetalComputeService;

use super::prelude::*;

#[tokio::test]
async fn host_crash_fails_the_action_when_retry_is_disabled() {
    let (builder, host) = PlatformBuilder::new().add_host("H", 4, 1024, 1.0);
    let platform = Arc::new(builder.build().unwrap());
    let clock = SimClock::new();

    let mut props = HashMap::new();
    props.insert("fail_action_after_action_executor_crash".to_string(), "true".to_string());
    let properties = PropertyMap::new(props, &BareMetalComputeService::schema()).unwrap();
    let service = BareMetalComputeService::new(
        Arc::clone(&platform),
        clock.clone(),
        vec![(host, 4, 1024)],
        properties,
        Arc::new(StorageDirectory::new()),
        None,
        no_custom_actions(),
    )
    .unwrap();
    service.start();

    let mut job = CompoundJob::new();
    let action_id = job.add_action(Action::new(ActionKind::Sleep { duration_secs: 10.0 }, 1, 1, 0, 0));
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

    let got = Arc::new(AtomicBool::new(false));
    let recv = tokio::spawn({
        let answer = Arc::clone(&answer);
        let got = Arc::clone(&got);
        async move {
            let outcome = answer.get().await.unwrap();
            got.store(true, Ordering::SeqCst);
            outcome
        }
    });

    let crash_clock = clock.clone();
    let crash_platform = Arc::clone(&platform);
    let crash_service = Arc::clone(&service);
    tokio::spawn(async move {
        crash_clock.sleep_for(1.0).await;
        crash_platform.crash_host(host);
        crash_service.on_host_crash(host);
    });

    tokio::task::yield_now().await;
    drive_clock_while(&clock, || !got.load(Ordering::SeqCst)).await;
    let outcome = recv.await.unwrap();

    assert_eq!(outcome.state, CompoundJobState::Discontinued);
    assert_eq!(clock.now(), 1.0);

    let job = job.lock();
    let action = job.action(action_id).unwrap();
    assert_eq!(action.state, ActionState::Failed);
    assert_eq!(action.failure_cause, Some(FailureCause::HostError { host: host.to_string() }));
    assert_eq!(action.execution_history.len(), 1);
}

#[tokio::test]
async fn host_crash_retries_the_action_once_the_host_comes_back_up() {
    let (builder, host) = PlatformBuilder::new().add_host("H", 4, 1024, 1.0);
    let platform = Arc::new(builder.build().unwrap());
    let clock = SimClock::new();

    // Retry is the default (`fail_action_after_action_executor_crash`
    // unset / false).
    let service = BareMetalComputeService::new(
        Arc::clone(&platform),
        clock.clone(),
        vec![(host, 4, 1024)],
        PropertyMap::empty(),
        Arc::new(StorageDirectory::new()),
        None,
        no_custom_actions(),
    )
    .unwrap();
    service.start();

    let mut job = CompoundJob::new();
    let action_id = job.add_action(Action::new(ActionKind::Sleep { duration_secs: 10.0 }, 1, 1, 0, 0));
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

    let got = Arc::new(AtomicBool::new(false));
    let recv = tokio::spawn({
        let answer = Arc::clone(&answer);
        let got = Arc::clone(&got);
        async move {
            let outcome = answer.get().await.unwrap();
            got.store(true, Ordering::SeqCst);
            outcome
        }
    });

    let crash_clock = clock.clone();
    let crash_platform = Arc::clone(&platform);
    let crash_service = Arc::clone(&service);
    tokio::spawn(async move {
        crash_clock.sleep_for(1.0).await;
        crash_platform.crash_host(host);
        crash_service.on_host_crash(host);

        crash_clock.sleep_for(1.0).await;
        crash_platform.reboot_host(host);
        crash_service.on_host_restart(host);
    });

    tokio::task::yield_now().await;
    drive_clock_while(&clock, || !got.load(Ordering::SeqCst)).await;
    let outcome = recv.await.unwrap();

    assert_eq!(outcome.state, CompoundJobState::Completed);
    assert_eq!(clock.now(), 12.0);

    let job = job.lock();
    let action = job.action(action_id).unwrap();
    assert_eq!(action.state, ActionState::Completed);
    assert_eq!(action.start_date, Some(2.0));
    assert_eq!(action.end_date, Some(12.0));
    assert_eq!(action.execution_history.len(), 2);
    assert_eq!(action.execution_history[0].outcome, ActionState::Failed);
    assert_eq!(action.execution_history[1].outcome, ActionState::Completed);
}
