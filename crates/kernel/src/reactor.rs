// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Reactor`]: the discrete-event driver loop.
//!
//! Actors run as ordinary tokio tasks on a single-threaded runtime; there
//! is no preemption and no real concurrency, only interleaving at await
//! points (Design Notes: "single-threaded cooperative"). The reactor's job
//! is to decide when every live actor has settled into a parked state
//! (blocked on [`crate::clock::SimClock::sleep_until`] or
//! [`crate::commport::CommPort::get`]) and, only then, advance virtual
//! time to the next pending wakeup. Advancing any earlier would let an
//! actor observe a future it hasn't earned by waiting for it.

use crate::actor::ActorRegistry;
use crate::clock::SimClock;

pub struct Reactor {
    clock: SimClock,
    registry: ActorRegistry,
}

impl Reactor {
    pub fn new(clock: SimClock, registry: ActorRegistry) -> Self {
        Self { clock, registry }
    }

    /// Run until no actors remain alive, or the simulation deadlocks
    /// (live actors remain but none has a pending wakeup — e.g. every
    /// survivor is blocked on a `CommPort::get` that nothing will ever
    /// `put` to).
    pub async fn run_to_completion(&self) {
        loop {
            loop {
                let active = self.registry.active_count();
                if active == 0 {
                    return;
                }
                if self.clock.parked_count() >= active {
                    break;
                }
                tokio::task::yield_now().await;
            }
            if !self.clock.advance() {
                tracing::warn!(
                    active = self.registry.active_count(),
                    "simulation deadlocked: live actors with no pending wakeup"
                );
                return;
            }
            // Give the actors the reactor just woke up a chance to run
            // (and possibly re-park or exit) before the outer loop
            // re-checks quiescence.
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
#[path = "reactor_tests.rs"]
mod tests;
