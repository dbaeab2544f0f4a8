//! spec.md §8 scenario 3: four compute actions (1 core / 500 B RAM each,
//! `flops=100`) compete for a 2-core / 1000 B host at 1 flop/s/core.
//! Priorities are `{10, 1, 1, 1}`; the priority-10 action and one other
//! start at `t=0` and finish at `t=100`, the remaining two start at
//! `t=100` and finish at `t=200`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as PLMutex;
use wrench_core::{Action, ActionKind, ActionState, CompoundJob, CompoundJobState, PropertyMap};
use wrench_kernel::{CommPort, PlatformBuilder, SimClock};
use wrench_services::storage_directory::StorageDirectory;

use super::prelude::*;

#[tokio::test]
async fn priority_ten_and_one_other_action_run_first_the_rest_wait_for_the_core() {
    let (builder, host) = PlatformBuilder::new().add_host("H", 2, 1000, 1.0);
    let platform = Arc::new(builder.build().unwrap());
    let clock = SimClock::new();
    let service = make_compute_service(
        Arc::clone(&platform),
        clock.clone(),
        vec![(host, 2, 1000)],
        PropertyMap::empty(),
        Arc::new(StorageDirectory::new()),
    );
    service.start();

    let mut job = CompoundJob::new();
    let priorities = [1_i64, 10, 1, 1];
    let action_ids: Vec<_> = priorities
        .iter()
        .map(|&priority| job.add_action(Action::new(ActionKind::Compute { flops: 100.0 }, 1, 1, 500, priority)))
        .collect();
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

    let got = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let recv = tokio::spawn({
        let answer = Arc::clone(&answer);
        let got = Arc::clone(&got);
        async move {
            let outcome = answer.get().await.unwrap();
            got.store(true, std::sync::atomic::Ordering::SeqCst);
            outcome
        }
    });
    tokio::task::yield_now().await;
    drive_clock_while(&clock, || !got.load(std::sync::atomic::Ordering::SeqCst)).await;
    let outcome = recv.await.unwrap();

    assert_eq!(outcome.state, CompoundJobState::Completed);
    assert_eq!(clock.now(), 200.0);

    let job = job.lock();
    let priority_ten = job.action(action_ids[1]).unwrap();
    assert_eq!(priority_ten.state, ActionState::Completed);
    assert_eq!(priority_ten.start_date, Some(0.0));
    assert_eq!(priority_ten.end_date, Some(100.0));

    let starts: Vec<f64> = action_ids.iter().map(|&id| job.action(id).unwrap().start_date.unwrap()).collect();
    let ends: Vec<f64> = action_ids.iter().map(|&id| job.action(id).unwrap().end_date.unwrap()).collect();
    assert_eq!(starts.iter().filter(|&&t| t == 0.0).count(), 2, "exactly two actions should start at t=0: {starts:?}");
    assert_eq!(starts.iter().filter(|&&t| t == 100.0).count(), 2, "exactly two actions should start at t=100: {starts:?}");
    assert!(ends.iter().all(|&t| t == 100.0 || t == 200.0));
    for &id in &action_ids {
        let action = job.action(id).unwrap();
        assert_eq!(action.state, ActionState::Completed);
        assert_eq!(action.end_date.unwrap() - action.start_date.unwrap(), 100.0);
    }
}
