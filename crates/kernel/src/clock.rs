// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`SimClock`]: the simulation's single source of virtual time.
//!
//! Virtual time never moves on its own — it only advances when
//! [`SimClock::advance`] is called by the driver loop ([`crate::reactor`]),
//! and only ever forward. Actors never read the wall clock; every delay in
//! the simulator is expressed as a wait registered here.

use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// `f64` wrapper with a total order, used as the heap key. Simulated times
/// are always finite (durations and host speeds never produce NaN), so
/// `partial_cmp().unwrap()` never panics in practice.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimeKey(f64);

impl Eq for TimeKey {}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WakeKey {
    at: TimeKey,
    seq: u64,
}

impl Ord for WakeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want the earliest time on top, so
        // reverse the comparison here rather than wrapping every push in
        // `std::cmp::Reverse`.
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for WakeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct ClockState {
    now: f64,
    next_seq: u64,
    heap: BinaryHeap<WakeKey>,
    waiters: std::collections::HashMap<u64, oneshot::Sender<()>>,
}

/// RAII marker held across a blocking wait; the [`crate::reactor::Reactor`]
/// advances virtual time only once every live actor holds one of these.
pub struct ParkGuard(Arc<AtomicUsize>);

impl Drop for ParkGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared handle to the simulation clock. Cheaply `Clone`-able; every
/// actor, service, and manager holds one.
#[derive(Clone)]
pub struct SimClock {
    inner: Arc<Mutex<ClockState>>,
    parked: Arc<AtomicUsize>,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockState {
                now: 0.0,
                next_seq: 0,
                heap: BinaryHeap::new(),
                waiters: std::collections::HashMap::new(),
            })),
            parked: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of tasks currently holding a [`ParkGuard`] (blocked in
    /// `sleep_until` or `CommPort::get`).
    pub fn parked_count(&self) -> usize {
        self.parked.load(Ordering::SeqCst)
    }

    /// Enter a parked state; the returned guard must be held for the
    /// duration of the blocking wait.
    pub fn park_guard(&self) -> ParkGuard {
        self.parked.fetch_add(1, Ordering::SeqCst);
        ParkGuard(Arc::clone(&self.parked))
    }

    pub fn now(&self) -> f64 {
        self.inner.lock().now
    }

    /// Park the calling task until simulated time reaches `at`. Resolves
    /// immediately (without registering a wakeup) if `at` is already in
    /// the past or present.
    pub async fn sleep_until(&self, at: f64) {
        let rx = {
            let mut state = self.inner.lock();
            if at <= state.now {
                return;
            }
            let (tx, rx) = oneshot::channel();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(WakeKey { at: TimeKey(at), seq });
            state.waiters.insert(seq, tx);
            rx
        };
        let _guard = self.park_guard();
        let _ = rx.await;
    }

    pub async fn sleep_for(&self, duration_secs: f64) {
        let at = self.now() + duration_secs.max(0.0);
        self.sleep_until(at).await;
    }

    /// Does any task have a pending wakeup registered?
    pub fn has_pending_wakeup(&self) -> bool {
        !self.inner.lock().heap.is_empty()
    }

    /// Advance to the next pending wakeup time and fire every waiter due
    /// at that instant. Returns `false` if nothing was pending (the
    /// driver loop then either terminates or is deadlocked on a blocking
    /// `CommPort` wait with no timeout — the latter is the caller's to
    /// detect).
    pub fn advance(&self) -> bool {
        let mut state = self.inner.lock();
        let Some(next) = state.heap.peek().copied() else {
            return false;
        };
        state.now = next.at.0;
        let mut due = Vec::new();
        while let Some(top) = state.heap.peek().copied() {
            if top.at != next.at {
                break;
            }
            state.heap.pop();
            due.push(top.seq);
        }
        for seq in due {
            if let Some(tx) = state.waiters.remove(&seq) {
                let _ = tx.send(());
            }
        }
        true
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
