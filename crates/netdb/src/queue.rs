// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event queue: multi-producer (one producer per source), single
//! consumer (the database manager). FIFO per source, atomic batches.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use netdb_core::{ControlEvent, EventBatch, RtnlEvent, SyncPoint, Target};

/// One queue item: a batch of events from one source.
pub(crate) type QueueItem = (Target, EventBatch);

pub(crate) fn channel() -> (EventSender, Receiver<QueueItem>) {
    let (tx, rx) = unbounded();
    (EventSender { tx }, rx)
}

/// Producer handle. Sends never block; the queue is unbounded and the
/// manager is the slow path bound.
#[derive(Clone)]
pub(crate) struct EventSender {
    tx: Sender<QueueItem>,
}

impl EventSender {
    /// Enqueue one batch. Silently dropped once the manager is gone.
    pub fn send(&self, target: &Target, batch: EventBatch) {
        let _ = self.tx.send((target.clone(), batch));
    }

    pub fn control(&self, target: &Target, event: ControlEvent) {
        self.send(target, vec![RtnlEvent::Control(event)]);
    }

    /// Block until the manager has consumed everything enqueued for
    /// `target` so far. Returns `false` on timeout or when the manager
    /// is already gone.
    pub fn drain(&self, target: &Target, timeout: Duration) -> bool {
        let point = SyncPoint::new();
        let sentinel = vec![RtnlEvent::Control(ControlEvent::Sync(point.clone()))];
        if self.tx.send((target.clone(), sentinel)).is_err() {
            return false;
        }
        point.wait(timeout)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
