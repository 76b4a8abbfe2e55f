// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Set-once rendezvous point shared between threads.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A clonable, set-once event.
///
/// Used as the queue rendezvous object: a producer pushes a `SyncPoint`
/// through the event queue and blocks on `wait`; the database manager
/// signals it once every preceding event from that source has been applied.
#[derive(Clone, Default)]
pub struct SyncPoint {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    set: Mutex<bool>,
    cond: Condvar,
}

impl SyncPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the point. Idempotent.
    pub fn set(&self) {
        let mut set = self.inner.set.lock();
        *set = true;
        self.inner.cond.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.inner.set.lock()
    }

    /// Block until the point is signalled or the timeout elapses.
    /// Returns `true` if the point was signalled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut set = self.inner.set.lock();
        if *set {
            return true;
        }
        self.inner.cond.wait_while_for(&mut set, |set| !*set, timeout);
        *set
    }
}

impl std::fmt::Debug for SyncPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPoint").field("set", &self.is_set()).finish()
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
