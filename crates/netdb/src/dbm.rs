// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The database manager: the single store writer.
//!
//! One dedicated thread consumes the event queue, dispatches every event
//! to its handler, and signals registered waiters after each applied
//! batch. Echo confirmation for commits and `View::wait` both ride on the
//! waiter registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use netdb_core::{ControlEvent, EntityKind, Match, RtnlEvent, SyncPoint, Target};

use crate::queue::QueueItem;
use crate::store::{Store, StoreHandle, TableSelect};

/// What a waiter is waiting for.
#[derive(Debug, Clone)]
pub(crate) enum WaitCond {
    /// A row matching the spec exists.
    Appear(Match),
    /// No row matches the spec.
    Vanish(Match),
}

struct Waiter {
    id: u64,
    kind: EntityKind,
    target: Target,
    cond: WaitCond,
    point: SyncPoint,
}

/// Registry of pending row-condition waiters, checked by the manager
/// after every applied batch.
#[derive(Default)]
pub(crate) struct Waiters {
    pending: Mutex<Vec<Waiter>>,
    next_id: AtomicU64,
}

impl Waiters {
    pub fn register(
        &self,
        kind: EntityKind,
        target: &Target,
        cond: WaitCond,
        point: SyncPoint,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().push(Waiter {
            id,
            kind,
            target: target.clone(),
            cond,
            point,
        });
        id
    }

    pub fn unregister(&self, id: u64) {
        self.pending.lock().retain(|w| w.id != id);
    }

    /// Signal every waiter whose condition now holds.
    pub fn check(&self, store: &Store) {
        let mut pending = self.pending.lock();
        pending.retain(|waiter| {
            if satisfied(store, waiter) {
                waiter.point.set();
                false
            } else {
                true
            }
        });
    }
}

fn satisfied(store: &Store, waiter: &Waiter) -> bool {
    condition_holds(store, waiter.kind, &waiter.target, &waiter.cond)
}

/// Whether a wait condition holds against the current store state.
pub(crate) fn condition_holds(
    store: &Store,
    kind: EntityKind,
    target: &Target,
    cond: &WaitCond,
) -> bool {
    let (spec, want_present) = match cond {
        WaitCond::Appear(spec) => (spec, true),
        WaitCond::Vanish(spec) => (spec, false),
    };
    let present = match kind {
        EntityKind::Link => has_match::<netdb_core::LinkRecord>(store, target, spec),
        EntityKind::Address => has_match::<netdb_core::AddressRecord>(store, target, spec),
        EntityKind::Route => has_match::<netdb_core::RouteRecord>(store, target, spec),
        EntityKind::Neighbour => has_match::<netdb_core::NeighbourRecord>(store, target, spec),
        EntityKind::Rule => has_match::<netdb_core::RuleRecord>(store, target, spec),
    };
    present == want_present
}

fn has_match<E: netdb_core::Entity>(store: &Store, target: &Target, spec: &Match) -> bool
where
    Store: TableSelect<E>,
{
    !TableSelect::<E>::table(store).select(Some(target), spec).is_empty()
}

/// The manager thread.
pub(crate) struct DbManager {
    store: Arc<StoreHandle>,
    rx: Receiver<QueueItem>,
    waiters: Arc<Waiters>,
    fatal: Arc<Mutex<Option<String>>>,
}

impl DbManager {
    pub fn spawn(
        store: Arc<StoreHandle>,
        rx: Receiver<QueueItem>,
        waiters: Arc<Waiters>,
        fatal: Arc<Mutex<Option<String>>>,
    ) -> std::io::Result<JoinHandle<()>> {
        let manager = DbManager { store, rx, waiters, fatal };
        std::thread::Builder::new().name("netdb-manager".to_string()).spawn(move || manager.run())
    }

    fn run(self) {
        info!("database manager started");
        for (target, batch) in self.rx.iter() {
            for event in batch {
                if !self.dispatch(&target, event) {
                    info!("database manager stopped");
                    return;
                }
            }
            self.waiters.check(&self.store.read_unchecked());
        }
        info!("event queue disconnected, database manager stopped");
    }

    /// Apply one event. Returns `false` when the loop must exit.
    fn dispatch(&self, target: &Target, event: RtnlEvent) -> bool {
        debug!(target = %target, event = event.name(), "dispatch");
        match event {
            RtnlEvent::NewLink(link) => self.store.write().upsert_link(target, link),
            RtnlEvent::DelLink(link) => self.store.write().delete_link(target, link.index),
            RtnlEvent::NewAddress(addr) => self.store.write().addresses.upsert(target, addr),
            RtnlEvent::DelAddress(addr) => {
                self.store.write().addresses.remove(target, &netdb_core::Entity::key(&addr));
            }
            RtnlEvent::NewRoute(route) => self.store.write().routes.upsert(target, route),
            RtnlEvent::DelRoute(route) => {
                self.store.write().routes.remove(target, &netdb_core::Entity::key(&route));
            }
            RtnlEvent::NewNeighbour(neigh) => self.store.write().neighbours.upsert(target, neigh),
            RtnlEvent::DelNeighbour(neigh) => {
                self.store.write().neighbours.remove(target, &netdb_core::Entity::key(&neigh));
            }
            RtnlEvent::NewRule(rule) => self.store.write().rules.upsert(target, rule),
            RtnlEvent::DelRule(rule) => {
                self.store.write().rules.remove(target, &netdb_core::Entity::key(&rule));
            }
            RtnlEvent::Control(control) => return self.dispatch_control(target, control),
        }
        true
    }

    fn dispatch_control(&self, target: &Target, control: ControlEvent) -> bool {
        match control {
            ControlEvent::Sync(point) => point.set(),
            ControlEvent::ReadLock => self.store.read_gate.close(),
            ControlEvent::ReadUnlock => self.store.read_gate.open(),
            ControlEvent::MarkFailed => self.store.write().mark_failed(target),
            ControlEvent::Flush => self.store.write().flush_target(target),
            ControlEvent::SourceAdded { kind, options } => {
                self.store
                    .write()
                    .sources
                    .insert(target.clone(), crate::store::SourceRow { kind, options });
            }
            ControlEvent::SourceRemoved => {
                self.store.write().sources.remove(target);
            }
            ControlEvent::Snapshot { ctxid, rows, done } => {
                self.store.write().insert_snapshot(&ctxid, target, rows);
                done.set();
            }
            ControlEvent::DropSnapshot { ctxid } => self.store.write().drop_snapshot(&ctxid),
            ControlEvent::Abort(reason) => {
                error!(target = %target, reason = %reason, "fatal source error");
                *self.fatal.lock() = Some(reason);
                return false;
            }
            ControlEvent::Shutdown => return false,
        }
        true
    }
}

#[cfg(test)]
#[path = "dbm_tests.rs"]
mod tests;
