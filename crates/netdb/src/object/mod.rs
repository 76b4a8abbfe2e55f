// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object handles: desired state over observed state, with transactional
//! commit, echo confirmation, and snapshot-based rollback.

mod address;
mod interface;
mod neighbour;
mod restore;
mod route;
mod rule;

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use nanoid::nanoid;
use tracing::debug;

use netdb_core::{
    ControlEvent, Entity, EntityKind, Error, Match, RtnlRequest, SyncPoint, Target, Value,
};

use crate::dbm::{condition_holds, WaitCond};
use crate::store::{Store, TableSelect};
use crate::NdbInner;

/// Object lifecycle.
///
/// `Invalid` objects exist only locally (new, failed, or removed);
/// `System` objects mirror a kernel row; `Snapshot` objects were
/// materialized from a snapshot set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Invalid,
    System,
    Snapshot,
}

/// A user-supplied key: a scalar shorthand or an explicit field map.
#[derive(Debug, Clone)]
pub enum KeySpec {
    Text(String),
    Num(u64),
    Spec(Match),
}

impl From<&str> for KeySpec {
    fn from(s: &str) -> Self {
        KeySpec::Text(s.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(s: String) -> Self {
        KeySpec::Text(s)
    }
}

impl From<u32> for KeySpec {
    fn from(n: u32) -> Self {
        KeySpec::Num(u64::from(n))
    }
}

impl From<Value> for KeySpec {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => KeySpec::Text(s),
            Value::Number(n) => KeySpec::Num(n.as_u64().unwrap_or(0)),
            Value::Object(map) => KeySpec::Spec(map.into_iter().collect()),
            _ => KeySpec::Spec(Match::new()),
        }
    }
}

/// Per-family behavior of the object layer: key completion, request
/// building, and the natural key used for echo confirmation.
pub trait ObjectOps: Entity {
    /// Expand a scalar key into a field match. The `target` entry is
    /// handled by the view, not here.
    fn complete_key(key: KeySpec) -> Result<Match, Error>;

    fn create_request(staged: &Self) -> Result<RtnlRequest, Error>;

    /// The request realizing `staged` over `loaded`, or `None` when
    /// nothing changed.
    fn update_request(
        loaded: &Self,
        staged: &Self,
        changed: &BTreeSet<String>,
    ) -> Result<Option<RtnlRequest>, Error>;

    fn delete_request(loaded: &Self) -> RtnlRequest;

    /// The user-visible identity of a row: stable across kernel-assigned
    /// index reallocation.
    fn natural_key(record: &Self) -> Match;
}

/// A long-lived handle for one row of one table.
///
/// Holds the loaded (observed) record and a staged (desired) copy; the
/// diff between them drives `commit()`. The back-reference to the
/// database is weak: objects never keep it alive.
#[derive(Debug)]
pub struct DbObject<E: ObjectOps> {
    inner: Weak<NdbInner>,
    target: Target,
    state: ObjectState,
    loaded: Option<E>,
    staged: E,
    changed: BTreeSet<String>,
    to_remove: bool,
    last_save: Option<String>,
}

impl<E: ObjectOps> DbObject<E>
where
    Store: TableSelect<E>,
{
    pub(crate) fn created(inner: &Arc<NdbInner>, target: Target, staged: E, changed: BTreeSet<String>) -> Self {
        Self {
            inner: Arc::downgrade(inner),
            target,
            state: ObjectState::Invalid,
            loaded: None,
            staged,
            changed,
            to_remove: false,
            last_save: None,
        }
    }

    pub(crate) fn from_row(inner: &Arc<NdbInner>, target: Target, record: E) -> Self {
        Self {
            inner: Arc::downgrade(inner),
            target,
            state: ObjectState::System,
            loaded: Some(record.clone()),
            staged: record,
            changed: BTreeSet::new(),
            to_remove: false,
            last_save: None,
        }
    }

    fn inner(&self) -> Result<Arc<NdbInner>, Error> {
        self.inner.upgrade().ok_or_else(|| Error::Fatal("database is gone".to_string()))
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The merged (staged-over-loaded) record.
    pub fn record(&self) -> &E {
        &self.staged
    }

    /// The last observed kernel row, if any.
    pub fn observed(&self) -> Option<&E> {
        self.loaded.as_ref()
    }

    /// The snapshot id stored by the last destructive commit.
    pub fn last_save(&self) -> Option<&str> {
        self.last_save.as_deref()
    }

    /// Read one attribute of the merged view.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.staged.field(field)
    }

    /// Stage one attribute. Chainable.
    pub fn set(&mut self, field: &str, value: Value) -> Result<&mut Self, Error> {
        self.staged.set_field(field, &value)?;
        self.changed.insert(field.to_string());
        Ok(self)
    }

    /// Stage several attributes from a JSON object.
    pub fn set_many(&mut self, spec: &Value) -> Result<&mut Self, Error> {
        let map = spec
            .as_object()
            .ok_or_else(|| Error::BadKey("attribute spec must be a JSON object".to_string()))?;
        for (field, value) in map {
            self.set(field, value.clone())?;
        }
        Ok(self)
    }

    /// Mark the object for deletion; the next `commit()` sends it.
    pub fn remove(&mut self) -> &mut Self {
        self.to_remove = true;
        self
    }

    /// Refresh the loaded record from the store by natural key.
    pub fn reload(&mut self) -> Result<(), Error> {
        let inner = self.inner()?;
        let key = E::natural_key(&self.staged);
        match select_one::<E>(&inner, &self.target, &key)? {
            Some(record) => {
                self.loaded = Some(record.clone());
                self.staged = record;
                self.changed.clear();
                self.state = ObjectState::System;
                Ok(())
            }
            None => {
                self.loaded = None;
                self.state = ObjectState::Invalid;
                Err(Error::NotFound(format!("{:?}", key)))
            }
        }
    }

    /// Realize the staged state on the kernel and wait for confirmation.
    ///
    /// On a kernel error the staging is preserved, the state becomes
    /// `Invalid`, and the error is raised as-is so the caller can correct
    /// and retry.
    pub fn commit(&mut self) -> Result<&mut Self, Error> {
        let inner = self.inner()?;
        inner.ensure_alive()?;
        let timeout = inner.options.rtnl_timeout;
        if !inner.store.write_gate.wait_open(timeout) {
            return Err(Error::Timeout(timeout));
        }
        if self.to_remove {
            self.commit_remove(&inner)?;
        } else if self.loaded.is_none() {
            self.commit_create(&inner)?;
        } else {
            self.commit_update(&inner)?;
        }
        Ok(self)
    }

    fn commit_create(&mut self, inner: &Arc<NdbInner>) -> Result<(), Error> {
        let request = E::create_request(&self.staged)?;
        let confirm = E::natural_key(&self.staged);
        debug!(target = %self.target, request = request.name(), "commit create");
        if let Err(e) =
            apply_and_confirm(inner, &self.target, request, E::KIND, WaitCond::Appear(confirm.clone()))
        {
            self.fail(&e);
            return Err(e);
        }
        self.adopt(inner, &confirm)
    }

    fn commit_update(&mut self, inner: &Arc<NdbInner>) -> Result<(), Error> {
        let loaded = match &self.loaded {
            Some(loaded) => loaded.clone(),
            None => return Err(Error::InvalidState("object has no loaded row".to_string())),
        };
        let request = match E::update_request(&loaded, &self.staged, &self.changed)? {
            Some(request) => request,
            None => return Ok(()),
        };
        self.last_save = Some(take_snapshot::<E>(inner, &self.target, &loaded)?);
        // Confirm by natural key plus the values we changed: the echo must
        // show them applied.
        let mut confirm = E::natural_key(&self.staged);
        for field in &self.changed {
            if let Some(value) = self.staged.field(field) {
                confirm.insert(field.clone(), value);
            }
        }
        debug!(target = %self.target, request = request.name(), "commit update");
        if let Err(e) =
            apply_and_confirm(inner, &self.target, request, E::KIND, WaitCond::Appear(confirm.clone()))
        {
            self.fail(&e);
            return Err(e);
        }
        self.adopt(inner, &E::natural_key(&self.staged))
    }

    fn commit_remove(&mut self, inner: &Arc<NdbInner>) -> Result<(), Error> {
        let loaded = match &self.loaded {
            Some(loaded) => loaded.clone(),
            None => {
                return Err(Error::InvalidState(
                    "cannot remove an object that was never loaded".to_string(),
                ))
            }
        };
        self.last_save = Some(take_snapshot::<E>(inner, &self.target, &loaded)?);
        let request = E::delete_request(&loaded);
        let vanish = E::natural_key(&loaded);
        debug!(target = %self.target, request = request.name(), "commit remove");
        if let Err(e) =
            apply_and_confirm(inner, &self.target, request, E::KIND, WaitCond::Vanish(vanish))
        {
            self.fail(&e);
            return Err(e);
        }
        self.to_remove = false;
        self.loaded = None;
        self.state = ObjectState::Invalid;
        Ok(())
    }

    /// Load the confirmed row back into the handle.
    fn adopt(&mut self, inner: &Arc<NdbInner>, confirm: &Match) -> Result<(), Error> {
        match select_one::<E>(inner, &self.target, confirm)? {
            Some(record) => {
                self.loaded = Some(record.clone());
                self.staged = record;
                self.changed.clear();
                self.state = ObjectState::System;
                Ok(())
            }
            None => {
                self.state = ObjectState::Invalid;
                Err(Error::NotFound(format!("{:?}", confirm)))
            }
        }
    }

    /// Kernel errors invalidate the object; timeouts leave it untouched.
    fn fail(&mut self, error: &Error) {
        if matches!(error, Error::Netlink { .. }) {
            self.state = ObjectState::Invalid;
        }
    }

    /// Store an explicit snapshot of the current row and its dependents.
    pub fn snapshot(&mut self) -> Result<String, Error> {
        let inner = self.inner()?;
        let loaded = match &self.loaded {
            Some(loaded) => loaded.clone(),
            None => {
                return Err(Error::InvalidState("cannot snapshot an unloaded object".to_string()))
            }
        };
        let ctxid = take_snapshot::<E>(&inner, &self.target, &loaded)?;
        self.last_save = Some(ctxid.clone());
        Ok(ctxid)
    }

    /// Roll back to the snapshot stored by the last commit.
    pub fn rollback(&mut self) -> Result<&mut Self, Error> {
        let ctxid = self
            .last_save
            .clone()
            .ok_or_else(|| Error::InvalidState("no snapshot to roll back to".to_string()))?;
        self.rollback_to(&ctxid)
    }

    /// Roll back to an explicit snapshot id: dependents and the root are
    /// restored by natural key, rewriting reallocated interface indices.
    pub fn rollback_to(&mut self, ctxid: &str) -> Result<&mut Self, Error> {
        let inner = self.inner()?;
        inner.ensure_alive()?;
        let set = inner
            .read_store()?
            .snapshots
            .get(ctxid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("snapshot {ctxid}")))?;
        restore::restore(&inner, &set)?;
        inner.evq.control(&self.target, ControlEvent::DropSnapshot { ctxid: ctxid.to_string() });
        // The drop is applied asynchronously; drain so a reload after
        // rollback observes the cleared transaction flags.
        inner.evq.drain(&self.target, inner.options.rtnl_timeout);
        if self.last_save.as_deref() == Some(ctxid) {
            self.last_save = None;
        }
        self.to_remove = false;
        self.reload()?;
        Ok(self)
    }
}

/// Submit one request through the target's source and wait for the
/// confirming (or refuting) state in the store.
pub(crate) fn apply_and_confirm(
    inner: &Arc<NdbInner>,
    target: &Target,
    request: RtnlRequest,
    kind: EntityKind,
    cond: WaitCond,
) -> Result<(), Error> {
    let source = inner.source(target)?;
    let point = SyncPoint::new();
    let waiter = inner.waiters.register(kind, target, cond.clone(), point.clone());
    let submitted = source.api(request.name(), |channel| channel.submit(&request));
    if let Err(e) = submitted {
        inner.waiters.unregister(waiter);
        return Err(e);
    }
    // The echo may already have been applied before we registered.
    let confirmed = condition_holds(&inner.store.read_unchecked(), kind, target, &cond)
        || point.wait(inner.options.rtnl_timeout);
    inner.waiters.unregister(waiter);
    if confirmed {
        Ok(())
    } else {
        Err(Error::Timeout(inner.options.rtnl_timeout))
    }
}

/// Collect and persist a snapshot of `loaded` and its dependents.
/// Blocks until the manager has stored it, so the following request
/// cannot outrun its own undo data.
pub(crate) fn take_snapshot<E: ObjectOps>(
    inner: &Arc<NdbInner>,
    target: &Target,
    loaded: &E,
) -> Result<String, Error>
where
    Store: TableSelect<E>,
{
    let ctxid = nanoid!(12);
    let rows = {
        let store = inner.read_store()?;
        restore::collect(&store, target, E::KIND, loaded.to_row())
    };
    let done = SyncPoint::new();
    inner.evq.control(
        target,
        ControlEvent::Snapshot { ctxid: ctxid.clone(), rows, done: done.clone() },
    );
    if !done.wait(inner.options.rtnl_timeout) {
        return Err(Error::Timeout(inner.options.rtnl_timeout));
    }
    Ok(ctxid)
}

/// First row matching `spec`, through the gated read path.
pub(crate) fn select_one<E: ObjectOps>(
    inner: &Arc<NdbInner>,
    target: &Target,
    spec: &Match,
) -> Result<Option<E>, Error>
where
    Store: TableSelect<E>,
{
    let store = inner.read_store()?;
    Ok(TableSelect::<E>::table(&*store)
        .select(Some(target), spec)
        .into_iter()
        .next()
        .map(|(_, record)| record))
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod tests;
