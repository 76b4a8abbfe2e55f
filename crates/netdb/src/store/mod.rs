// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The relational state store: typed tables keyed by `(target, key)`,
//! specialized mirror tables for bridges and VLANs, source descriptors,
//! and snapshot sets.
//!
//! Everyone may read (through the read gate); only the database manager
//! writes. That contract is enforced by visibility: every mutating method
//! is `pub(crate)` and called from the manager thread alone.

mod gate;

use std::collections::BTreeMap;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use tracing::debug;

use netdb_core::{
    AddressRecord, Entity, EntityKind, LinkRecord, Match, NeighbourRecord, RouteRecord,
    RuleRecord, SnapshotRow, Target, Value,
};

pub(crate) use gate::Gate;

/// Tombstone set on every row of a failed source.
pub const TFLAG_TOMBSTONE: u32 = 0x1;
/// Row participates in an in-flight transaction snapshot.
pub const TFLAG_IN_FLIGHT: u32 = 0x2;

/// One stored row: the record plus its transient flags.
#[derive(Debug, Clone)]
pub struct TableRow<E> {
    pub record: E,
    pub tflags: u32,
}

/// One table, keyed by `(target, composite key)`.
#[derive(Debug)]
pub struct Table<E: Entity> {
    rows: BTreeMap<(Target, E::Key), TableRow<E>>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self { rows: BTreeMap::new() }
    }
}

impl<E: Entity> Table<E> {
    pub fn get(&self, target: &Target, key: &E::Key) -> Option<&TableRow<E>> {
        self.rows.get(&(target.clone(), key.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(Target, E::Key), &TableRow<E>)> {
        self.rows.iter()
    }

    pub fn iter_target<'a>(
        &'a self,
        target: &'a Target,
    ) -> impl Iterator<Item = &'a TableRow<E>> + 'a {
        self.rows.iter().filter(move |((t, _), _)| t == target).map(|(_, row)| row)
    }

    /// Rows matching `spec`, optionally restricted to one target.
    pub fn select(&self, target: Option<&Target>, spec: &Match) -> Vec<(Target, E)> {
        self.rows
            .iter()
            .filter(|((t, _), _)| target.map_or(true, |want| t == want))
            .filter(|(_, row)| row.record.matches(spec))
            .map(|((t, _), row)| (t.clone(), row.record.clone()))
            .collect()
    }

    pub fn count(&self, target: Option<&Target>) -> usize {
        self.rows.keys().filter(|(t, _)| target.map_or(true, |want| t == want)).count()
    }

    // -- mutations, manager only -------------------------------------------

    pub(crate) fn upsert(&mut self, target: &Target, record: E) {
        let key = (target.clone(), record.key());
        match self.rows.get_mut(&key) {
            Some(row) => row.record = record,
            None => {
                self.rows.insert(key, TableRow { record, tflags: 0 });
            }
        }
    }

    pub(crate) fn remove(&mut self, target: &Target, key: &E::Key) -> Option<E> {
        self.rows.remove(&(target.clone(), key.clone())).map(|row| row.record)
    }

    pub(crate) fn remove_where(
        &mut self,
        target: &Target,
        pred: impl Fn(&E) -> bool,
    ) -> Vec<E> {
        let doomed: Vec<(Target, E::Key)> = self
            .rows
            .iter()
            .filter(|((t, _), row)| t == target && pred(&row.record))
            .map(|(k, _)| k.clone())
            .collect();
        doomed
            .into_iter()
            .filter_map(|key| self.rows.remove(&key).map(|row| row.record))
            .collect()
    }

    pub(crate) fn flush_target(&mut self, target: &Target) -> usize {
        let before = self.rows.len();
        self.rows.retain(|(t, _), _| t != target);
        before - self.rows.len()
    }

    pub(crate) fn set_tflags(&mut self, target: &Target, flag: u32) {
        for ((t, _), row) in self.rows.iter_mut() {
            if t == target {
                row.tflags |= flag;
            }
        }
    }

    pub(crate) fn flag_row(&mut self, target: &Target, key: &E::Key, flag: u32, on: bool) {
        if let Some(row) = self.rows.get_mut(&(target.clone(), key.clone())) {
            if on {
                row.tflags |= flag;
            } else {
                row.tflags &= !flag;
            }
        }
    }
}

/// A persisted source descriptor (`sources` + `sources_options` rows).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceRow {
    pub kind: String,
    pub options: BTreeMap<String, Value>,
}

/// One snapshot set, keyed by context id.
#[derive(Debug, Clone)]
pub struct SnapshotSet {
    pub target: Target,
    pub rows: Vec<SnapshotRow>,
}

/// The whole database state.
#[derive(Default)]
pub struct Store {
    pub links: Table<LinkRecord>,
    pub addresses: Table<AddressRecord>,
    pub routes: Table<RouteRecord>,
    pub neighbours: Table<NeighbourRecord>,
    pub rules: Table<RuleRecord>,
    /// Mirror of `links` restricted to kind `bridge`.
    pub bridges: BTreeMap<(Target, u32), LinkRecord>,
    /// Mirror of `links` restricted to kind `vlan`.
    pub vlans: BTreeMap<(Target, u32), LinkRecord>,
    pub sources: BTreeMap<Target, SourceRow>,
    pub snapshots: BTreeMap<String, SnapshotSet>,
}

impl Store {
    // -- event application, manager only -----------------------------------

    pub(crate) fn upsert_link(&mut self, target: &Target, mut link: LinkRecord) {
        link.sync_state();
        let mirror_key = (target.clone(), link.index);
        self.bridges.remove(&mirror_key);
        self.vlans.remove(&mirror_key);
        match link.kind.as_deref() {
            Some("bridge") => {
                self.bridges.insert(mirror_key, link.clone());
            }
            Some("vlan") => {
                self.vlans.insert(mirror_key, link.clone());
            }
            _ => {}
        }
        self.links.upsert(target, link);
    }

    /// Remove a link row and cascade its dependents. The kernel emits
    /// delete events for dependents as well; applying both is idempotent.
    pub(crate) fn delete_link(&mut self, target: &Target, index: u32) {
        self.links.remove(target, &index);
        self.bridges.remove(&(target.clone(), index));
        self.vlans.remove(&(target.clone(), index));
        let addresses = self.addresses.remove_where(target, |a| a.index == index);
        let routes = self.routes.remove_where(target, |r| r.oif == Some(index));
        let neighbours = self.neighbours.remove_where(target, |n| n.ifindex == index);
        if !addresses.is_empty() || !routes.is_empty() || !neighbours.is_empty() {
            debug!(
                target = %target,
                index,
                addresses = addresses.len(),
                routes = routes.len(),
                neighbours = neighbours.len(),
                "cascaded link removal"
            );
        }
    }

    pub(crate) fn flush_target(&mut self, target: &Target) {
        let links = self.links.flush_target(target);
        let addresses = self.addresses.flush_target(target);
        let routes = self.routes.flush_target(target);
        let neighbours = self.neighbours.flush_target(target);
        let rules = self.rules.flush_target(target);
        self.bridges.retain(|(t, _), _| t != target);
        self.vlans.retain(|(t, _), _| t != target);
        debug!(
            target = %target,
            links, addresses, routes, neighbours, rules,
            "flushed target"
        );
    }

    pub(crate) fn mark_failed(&mut self, target: &Target) {
        self.links.set_tflags(target, TFLAG_TOMBSTONE);
        self.addresses.set_tflags(target, TFLAG_TOMBSTONE);
        self.routes.set_tflags(target, TFLAG_TOMBSTONE);
        self.neighbours.set_tflags(target, TFLAG_TOMBSTONE);
        self.rules.set_tflags(target, TFLAG_TOMBSTONE);
    }

    /// Store a snapshot set and mark every member row (and, through the
    /// reverse walk, its owning link) as participating in a transaction.
    pub(crate) fn insert_snapshot(
        &mut self,
        ctxid: &str,
        target: &Target,
        rows: Vec<SnapshotRow>,
    ) {
        for row in &rows {
            self.flag_snapshot_row(target, row, true);
        }
        self.snapshots
            .insert(ctxid.to_string(), SnapshotSet { target: target.clone(), rows });
    }

    pub(crate) fn drop_snapshot(&mut self, ctxid: &str) {
        if let Some(set) = self.snapshots.remove(ctxid) {
            let target = set.target.clone();
            for row in &set.rows {
                self.flag_snapshot_row(&target, row, false);
            }
        }
    }

    /// Flag one snapshot member. Dependent rows propagate the flag to the
    /// link that owns them, so selecting a transaction set in one table
    /// reveals its dependencies.
    fn flag_snapshot_row(&mut self, target: &Target, row: &SnapshotRow, on: bool) {
        match row.kind {
            EntityKind::Link => {
                if let Some(rec) = from_row::<LinkRecord>(&row.row) {
                    self.links.flag_row(target, &rec.key(), TFLAG_IN_FLIGHT, on);
                }
            }
            EntityKind::Address => {
                if let Some(rec) = from_row::<AddressRecord>(&row.row) {
                    self.addresses.flag_row(target, &rec.key(), TFLAG_IN_FLIGHT, on);
                    self.links.flag_row(target, &rec.index, TFLAG_IN_FLIGHT, on);
                }
            }
            EntityKind::Route => {
                if let Some(rec) = from_row::<RouteRecord>(&row.row) {
                    self.routes.flag_row(target, &rec.key(), TFLAG_IN_FLIGHT, on);
                    if let Some(oif) = rec.oif {
                        self.links.flag_row(target, &oif, TFLAG_IN_FLIGHT, on);
                    }
                }
            }
            EntityKind::Neighbour => {
                if let Some(rec) = from_row::<NeighbourRecord>(&row.row) {
                    self.neighbours.flag_row(target, &rec.key(), TFLAG_IN_FLIGHT, on);
                    self.links.flag_row(target, &rec.ifindex, TFLAG_IN_FLIGHT, on);
                }
            }
            EntityKind::Rule => {
                if let Some(rec) = from_row::<RuleRecord>(&row.row) {
                    self.rules.flag_row(target, &rec.key(), TFLAG_IN_FLIGHT, on);
                }
            }
        }
    }
}

/// Deserialize a snapshot row back into its record type.
pub(crate) fn from_row<E: DeserializeOwned>(row: &Value) -> Option<E> {
    serde_json::from_value(row.clone()).ok()
}

/// The specialized link tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorKind {
    Bridge,
    Vlan,
}

/// Typed access to the table holding `E` rows.
pub trait TableSelect<E: Entity> {
    fn table(&self) -> &Table<E>;

    #[doc(hidden)]
    fn table_mut(&mut self) -> &mut Table<E>;

    /// The specialized mirror for this entity, if one exists.
    fn mirror(&self, which: MirrorKind) -> Option<&BTreeMap<(Target, u32), E>> {
        let _ = which;
        None
    }
}

macro_rules! table_select {
    ($entity:ty, $field:ident) => {
        impl TableSelect<$entity> for Store {
            fn table(&self) -> &Table<$entity> {
                &self.$field
            }

            fn table_mut(&mut self) -> &mut Table<$entity> {
                &mut self.$field
            }
        }
    };
}

impl TableSelect<LinkRecord> for Store {
    fn table(&self) -> &Table<LinkRecord> {
        &self.links
    }

    fn table_mut(&mut self) -> &mut Table<LinkRecord> {
        &mut self.links
    }

    fn mirror(&self, which: MirrorKind) -> Option<&BTreeMap<(Target, u32), LinkRecord>> {
        match which {
            MirrorKind::Bridge => Some(&self.bridges),
            MirrorKind::Vlan => Some(&self.vlans),
        }
    }
}

table_select!(AddressRecord, addresses);
table_select!(RouteRecord, routes);
table_select!(NeighbourRecord, neighbours);
table_select!(RuleRecord, rules);

/// Gate-checked shared access to the store.
pub struct StoreHandle {
    store: RwLock<Store>,
    pub(crate) read_gate: Gate,
    pub(crate) write_gate: Gate,
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self {
            store: RwLock::new(Store::default()),
            read_gate: Gate::new(true),
            write_gate: Gate::new(true),
        }
    }
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader access, blocking while a source reload holds the read gate
    /// closed. Errors with `Timeout` if the gate stays closed.
    pub fn read(
        &self,
        timeout: std::time::Duration,
    ) -> Result<RwLockReadGuard<'_, Store>, netdb_core::Error> {
        if !self.read_gate.wait_open(timeout) {
            return Err(netdb_core::Error::Timeout(timeout));
        }
        Ok(self.store.read())
    }

    /// Manager-internal access that bypasses the read gate: the manager
    /// must see rows while the gate is closed mid-reload.
    pub(crate) fn read_unchecked(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read()
    }

    /// The single writer handle. Manager thread only.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
