// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`CommPort`]: a named, typed, reliable, in-order message channel
//! between two actors — the simulator's sole inter-actor communication
//! primitive. Mirrors WRENCH's mailbox abstraction: `put`/`get` block the
//! calling actor, `iput`/`iget` return a handle ([`PendingComm`]) the
//! caller can await later, and [`CommPort::null`] models the
//! `NULL_MAILBOX` sentinel passed when no reply is wanted.

use crate::clock::SimClock;
use crate::platform::Link;
use futures::future::{select_all, BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use wrench_core::FailureCause;

/// A pending non-blocking communication operation, to be awaited whenever
/// the caller is ready (WRENCH's `iget`/`iput` + `wait()` pattern).
pub type PendingComm<T> = BoxFuture<'static, Result<T, FailureCause>>;

pub struct CommPort<T> {
    id: String,
    is_null: bool,
    clock: SimClock,
    tx: mpsc::UnboundedSender<T>,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T: Send + 'static> CommPort<T> {
    pub fn named(id: impl Into<String>, clock: SimClock) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { id: id.into(), is_null: false, clock, tx, rx: Arc::new(AsyncMutex::new(rx)) }
    }

    /// The `NULL_COMMPORT` sentinel: `put` always succeeds and the message
    /// is discarded; `get` never resolves.
    pub fn null(clock: SimClock) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { id: "NULL_COMMPORT".to_string(), is_null: true, clock, tx, rx: Arc::new(AsyncMutex::new(rx)) }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Blocking, synchronous-looking send — the channel is unbounded so
    /// this never actually awaits, matching a `put` whose network transfer
    /// time the caller (not the port) is responsible for modeling.
    pub fn put(&self, msg: T) -> Result<(), FailureCause> {
        if self.is_null {
            return Ok(());
        }
        self.tx.send(msg).map_err(|_| FailureCause::network_error("commport closed"))
    }

    /// Non-blocking send: identical to `put` since the channel cannot
    /// apply backpressure, but named separately to mirror the `iput`/`put`
    /// distinction callers expect.
    pub fn iput(&self, msg: T) -> Result<(), FailureCause> {
        self.put(msg)
    }

    /// `put`, but billing `bytes` of simulated transmission time along
    /// `link` first (spec.md §4.1: "simulates transmission of
    /// `msg.payload_size` bytes along the source→dest route"). `link`
    /// being `None` (no route between the two endpoints, e.g. same host)
    /// bills no network time, matching [`crate::platform::Platform::route`].
    pub async fn put_billed(&self, msg: T, bytes: u64, link: Option<Link>) -> Result<(), FailureCause> {
        if let Some(link) = link {
            if bytes > 0 {
                self.clock.sleep_for(link.transfer_time(bytes)).await;
            }
        }
        self.put(msg)
    }

    pub async fn get(&self) -> Result<T, FailureCause> {
        let _guard = self.clock.park_guard();
        if self.is_null {
            return std::future::pending().await;
        }
        self.rx.lock().await.recv().await.ok_or_else(|| FailureCause::network_error("commport closed"))
    }

    /// Block until a message arrives or `timeout_secs` of virtual time
    /// elapses, whichever comes first. A deadline expiry is a
    /// `NetworkError{timeout: true}` (spec.md §4.1/§5), not a job-level
    /// timeout — callers that mean the latter (a `PilotJob`'s TTL, say)
    /// translate it themselves.
    pub async fn get_with_timeout(&self, timeout_secs: f64) -> Result<T, FailureCause> {
        tokio::select! {
            biased;
            msg = self.get() => msg,
            () = self.clock.sleep_for(timeout_secs) => Err(FailureCause::network_timeout("get() deadline expired")),
        }
    }

    /// Start a receive without blocking the caller now; the returned
    /// future can be awaited (alone, or via [`wait_for_any`]) later.
    pub fn iget(&self) -> PendingComm<T> {
        let rx = Arc::clone(&self.rx);
        let clock = self.clock.clone();
        let is_null = self.is_null;
        async move {
            let _guard = clock.park_guard();
            if is_null {
                return std::future::pending().await;
            }
            rx.lock().await.recv().await.ok_or_else(|| FailureCause::network_error("commport closed"))
        }
        .boxed()
    }
}

/// Wait on several ports at once, resolving as soon as any one of them
/// receives a message; returns the winning port's index in `ports`.
/// Rejects an empty handle set with `InvalidArgument` (spec.md §4.1)
/// rather than calling into `select_all` on nothing, which panics.
pub async fn wait_for_any<T: Send + 'static>(
    ports: &[&CommPort<T>],
) -> Result<(usize, Result<T, FailureCause>), FailureCause> {
    if ports.is_empty() {
        return Err(FailureCause::invalid_argument("wait_for_any called with an empty port set"));
    }
    let pending: Vec<PendingComm<T>> = ports.iter().map(|p| p.iget()).collect();
    let (result, index, _still_pending) = select_all(pending).await;
    Ok((index, result))
}

#[cfg(test)]
#[path = "commport_tests.rs"]
mod tests;
