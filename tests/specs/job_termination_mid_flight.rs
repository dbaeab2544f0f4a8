//! spec.md §8 scenario 5: a job is submitted at `t=0` and `terminateJob`
//! is called at `t=1`. The job ends DISCONTINUED, its running action is
//! KILLED with `JobKilled`, and — because termination is synchronous from
//! the caller's point of view — the controller never receives a terminal
//! completion event through the answer port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as PLMutex;
use wrench_core::{Action, ActionKind, ActionState, CompoundJob, FailureCause, PropertyMap};
use wrench_kernel::{CommPort, SimClock};
use wrench_services::storage_directory::StorageDirectory;

use super::prelude::*;

#[tokio::test]
async fn terminating_a_job_mid_flight_kills_its_running_action_and_emits_no_answer() {
    let platform = two_host_platform();
    let clock = SimClock::new();
    let service = make_compute_service(
        Arc::clone(&platform.platform),
        clock.clone(),
        vec![(platform.host_b, 10, 10_000_000)],
        PropertyMap::empty(),
        Arc::new(StorageDirectory::new()),
    );
    service.start();

    let mut job = CompoundJob::new();
    let action_id = job.add_action(Action::new(ActionKind::Sleep { duration_secs: 10.0 }, 1, 1, 0, 0));
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    let job_id = service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

    // Nothing should arrive on the answer port; this task just records
    // whether anything ever does.
    let got_answer = Arc::new(AtomicBool::new(false));
    let watcher = tokio::spawn({
        let answer = Arc::clone(&answer);
        let got_answer = Arc::clone(&got_answer);
        async move {
            if answer.get().await.is_ok() {
                got_answer.store(true, Ordering::SeqCst);
            }
        }
    });

    // Terminate the job once simulated time reaches t=1, while its sole
    // action is still STARTED (the sleep would otherwise run until t=10).
    let terminated = Arc::new(AtomicBool::new(false));
    let terminate_clock = clock.clone();
    let terminate_service = Arc::clone(&service);
    let terminate_flag = Arc::clone(&terminated);
    tokio::spawn(async move {
        terminate_clock.sleep_for(1.0).await;
        terminate_service.terminate_job(job_id).unwrap();
        terminate_flag.store(true, Ordering::SeqCst);
    });

    tokio::task::yield_now().await;
    drive_clock_while(&clock, || !terminated.load(Ordering::SeqCst)).await;
    // Give the killed executor's actor a chance to actually exit and run
    // its on_exit hook before inspecting final state.
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }

    assert_eq!(clock.now(), 1.0);
    {
        let job = job.lock();
        let action = job.action(action_id).unwrap();
        assert_eq!(action.state, ActionState::Killed);
        assert_eq!(action.failure_cause, Some(FailureCause::JobKilled { action: Some(action_id) }));
        assert_eq!(action.start_date, Some(0.0));
    }

    watcher.abort();
    assert!(!got_answer.load(Ordering::SeqCst), "a terminated job must not emit a terminal event");
}
