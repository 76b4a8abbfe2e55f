// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A queryable, transactional model of kernel network state.
//!
//! `Netdb` consolidates links, addresses, routes, neighbours, and routing
//! rules from one or more RTNL event sources (the host kernel, network
//! namespaces, or anything with a registered transport) into one
//! relational store, kept current by a single-writer event pipeline.
//! Callers query through views and mutate kernel state by editing objects
//! and committing them; every commit is confirmed by the kernel's own
//! echo event and can be rolled back from a snapshot.
//!
//! ```no_run
//! use netdb::{Netdb, Options};
//! use serde_json::json;
//!
//! let db = Netdb::open(Options::default())?;
//! let mut dummy = db
//!     .interfaces()
//!     .create(json!({"ifname": "dummy0", "kind": "dummy", "state": "up"}))?;
//! dummy.commit()?;
//! println!("{}", db.interfaces().summary()?);
//! dummy.remove().commit()?;
//! db.close();
//! # Ok::<(), netdb::Error>(())
//! ```

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dbm;
mod object;
mod options;
mod queue;
mod report;
mod sources;
pub mod store;
mod view;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLockReadGuard};
use serde_json::json;
use tracing::warn;

use crate::dbm::{DbManager, Waiters};
use crate::queue::EventSender;
use crate::sources::Source;
use crate::store::{MirrorKind, Store, StoreHandle};

pub use netdb_core::{
    AddressKey, AddressRecord, Entity, EntityKind, Error, LinkRecord, LinkState, Match,
    NeighbourKey, NeighbourRecord, NextHop, RouteKey, RouteRecord, RuleKey, RuleRecord, Target,
    Value,
};
pub use object::{DbObject, KeySpec, ObjectOps, ObjectState};
pub use options::Options;
pub use report::{Report, ReportFormat, MAX_REPORT_LINES};
pub use sources::{SourceSpec, SourceState, Sources};
pub use view::View;

/// Shared state behind every handle the database gives out.
pub(crate) struct NdbInner {
    pub(crate) options: Options,
    pub(crate) store: Arc<StoreHandle>,
    pub(crate) evq: EventSender,
    pub(crate) waiters: Arc<Waiters>,
    pub(crate) fatal: Arc<Mutex<Option<String>>>,
    pub(crate) sources: Mutex<BTreeMap<Target, Arc<Source>>>,
    pub(crate) manager: Mutex<Option<JoinHandle<()>>>,
    pub(crate) closed: AtomicBool,
}

impl NdbInner {
    /// Fails once the database is closed or the manager died on a fatal
    /// error (schema bugs surface here, on the next API call).
    pub(crate) fn ensure_alive(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Fatal("database is closed".to_string()));
        }
        if let Some(reason) = self.fatal.lock().clone() {
            return Err(Error::Fatal(reason));
        }
        Ok(())
    }

    pub(crate) fn source(&self, target: &Target) -> Result<Arc<Source>, Error> {
        self.sources
            .lock()
            .get(target)
            .cloned()
            .ok_or_else(|| Error::NoSource(target.clone()))
    }

    /// Gate-checked read access for query paths.
    pub(crate) fn read_store(&self) -> Result<RwLockReadGuard<'_, Store>, Error> {
        self.ensure_alive()?;
        self.store.read(self.options.read_timeout)
    }
}

/// The network database handle. Cheap to clone via the accessor views;
/// `close()` (or drop) tears down sources and the manager thread.
pub struct Netdb {
    inner: Arc<NdbInner>,
}

impl Netdb {
    /// Open the database: start the manager thread and connect every
    /// configured source (by default, the local kernel as `localhost`).
    pub fn open(options: Options) -> Result<Self, Error> {
        let store = Arc::new(StoreHandle::new());
        let (evq, rx) = queue::channel();
        let waiters = Arc::new(Waiters::default());
        let fatal = Arc::new(Mutex::new(None));
        let manager =
            DbManager::spawn(Arc::clone(&store), rx, Arc::clone(&waiters), Arc::clone(&fatal))
                .map_err(|e| Error::Channel(e.to_string()))?;

        let initial = options.sources.clone();
        let inner = Arc::new(NdbInner {
            options,
            store,
            evq,
            waiters,
            fatal,
            sources: Mutex::new(BTreeMap::new()),
            manager: Mutex::new(Some(manager)),
            closed: AtomicBool::new(false),
        });
        let db = Netdb { inner };
        for spec in initial {
            if let Err(e) = db.sources().add(spec) {
                db.close();
                return Err(e);
            }
        }
        Ok(db)
    }

    /// The interfaces view.
    pub fn interfaces(&self) -> View<LinkRecord> {
        View::<LinkRecord>::new(&self.inner, Match::new())
    }

    /// Bridges: interfaces of kind `bridge`, read from the specialized
    /// table, with bridge summary columns.
    pub fn bridges(&self) -> View<LinkRecord> {
        let mut constraints = Match::new();
        constraints.insert("kind".to_string(), json!("bridge"));
        View::<LinkRecord>::specialized(
            &self.inner,
            constraints,
            MirrorKind::Bridge,
            &["index", "ifname", "address", "br_stp_state", "br_vlan_filtering"],
        )
    }

    /// VLANs: interfaces of kind `vlan`, read from the specialized table.
    pub fn vlans(&self) -> View<LinkRecord> {
        let mut constraints = Match::new();
        constraints.insert("kind".to_string(), json!("vlan"));
        View::<LinkRecord>::specialized(
            &self.inner,
            constraints,
            MirrorKind::Vlan,
            &["index", "ifname", "address", "link", "vlan_id"],
        )
    }

    pub fn addresses(&self) -> View<AddressRecord> {
        View::<AddressRecord>::new(&self.inner, Match::new())
    }

    pub fn routes(&self) -> View<RouteRecord> {
        View::<RouteRecord>::new(&self.inner, Match::new())
    }

    pub fn neighbours(&self) -> View<NeighbourRecord> {
        View::<NeighbourRecord>::new(&self.inner, Match::new())
    }

    pub fn rules(&self) -> View<RuleRecord> {
        View::<RuleRecord>::new(&self.inner, Match::new())
    }

    /// The sources registry view.
    pub fn sources(&self) -> Sources {
        Sources { inner: Arc::clone(&self.inner) }
    }

    /// Shared read access to the underlying store.
    pub fn store(&self) -> Arc<StoreHandle> {
        Arc::clone(&self.inner.store)
    }

    #[cfg(test)]
    pub(crate) fn inner_source_for_test(&self, target: &str) -> Arc<Source> {
        match self.inner.source(&Target::new(target)) {
            Ok(source) => source,
            Err(e) => panic!("no such source: {e}"),
        }
    }

    #[cfg(test)]
    pub(crate) fn inner_abort_for_test(&self, reason: &str) {
        self.inner
            .evq
            .control(&Target::localhost(), netdb_core::ControlEvent::Abort(reason.to_string()));
    }

    /// Orderly shutdown: close every source (draining its queue), then
    /// stop the manager. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let sources: Vec<Arc<Source>> = {
            let mut map = self.inner.sources.lock();
            let drained = map.values().cloned().collect();
            map.clear();
            drained
        };
        for source in sources {
            source.close(false);
        }
        self.inner.evq.control(&Target::localhost(), netdb_core::ControlEvent::Shutdown);
        if let Some(handle) = self.inner.manager.lock().take() {
            if handle.join().is_err() {
                warn!("database manager thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Netdb {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod testkit;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
