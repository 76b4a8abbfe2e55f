// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot collection and the rollback restore engine.
//!
//! A snapshot of an interface also captures its dependents: enslaved
//! ports, stacked VLAN children, owned addresses, and routes leaving
//! through it. Restore rebuilds in dependency order — root first, then
//! ports, VLANs, addresses, routes — re-resolving by natural key because
//! a recreated interface gets a fresh kernel index.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use netdb_core::{
    AddressRecord, DepRole, Entity, EntityKind, Error, LinkChanges, LinkRecord, Match,
    NeighbourRecord, RouteRecord, RtnlRequest, RuleRecord, SnapshotRow, Target, Value, IFF_UP,
};

use crate::dbm::WaitCond;
use crate::store::{from_row, SnapshotSet, Store};
use crate::NdbInner;

use super::{apply_and_confirm, select_one, ObjectOps};

/// Gather the snapshot rows for one root row. Runs under the store's
/// coarse read lock so the dependency walk appears atomic.
pub(crate) fn collect(
    store: &Store,
    target: &Target,
    kind: EntityKind,
    root_row: Value,
) -> Vec<SnapshotRow> {
    let mut rows = vec![SnapshotRow::new(kind, DepRole::Root, root_row.clone())];
    if kind != EntityKind::Link {
        return rows;
    }
    let index = root_row.get("index").and_then(Value::as_u64).unwrap_or(0) as u32;
    for row in store.links.iter_target(target) {
        if row.record.master == Some(index) {
            rows.push(SnapshotRow::new(EntityKind::Link, DepRole::Port, row.record.to_row()));
        }
        if row.record.link == Some(index) && row.record.kind.as_deref() == Some("vlan") {
            rows.push(SnapshotRow::new(EntityKind::Link, DepRole::VlanChild, row.record.to_row()));
        }
    }
    for row in store.addresses.iter_target(target) {
        if row.record.index == index {
            rows.push(SnapshotRow::new(EntityKind::Address, DepRole::Address, row.record.to_row()));
        }
    }
    for row in store.routes.iter_target(target) {
        if row.record.oif == Some(index) {
            rows.push(SnapshotRow::new(EntityKind::Route, DepRole::Route, row.record.to_row()));
        }
    }
    rows
}

/// Replay one snapshot set against the kernel.
pub(crate) fn restore(inner: &Arc<NdbInner>, set: &SnapshotSet) -> Result<(), Error> {
    let target = &set.target;
    let mut index_map: BTreeMap<u32, u32> = BTreeMap::new();

    if let Some(root) = set.rows.iter().find(|r| r.role == DepRole::Root) {
        match root.kind {
            EntityKind::Link => restore_root_link(inner, target, root, &mut index_map)?,
            EntityKind::Address => restore_address(inner, target, root, &index_map)?,
            EntityKind::Route => restore_route(inner, target, root, &index_map)?,
            EntityKind::Neighbour => restore_neighbour(inner, target, root, &index_map)?,
            EntityKind::Rule => restore_rule(inner, target, root)?,
        }
    }
    for row in set.rows.iter().filter(|r| r.role == DepRole::Port) {
        restore_port(inner, target, row, &index_map)?;
    }
    for row in set.rows.iter().filter(|r| r.role == DepRole::VlanChild) {
        restore_vlan_child(inner, target, row, &index_map)?;
    }
    for row in set.rows.iter().filter(|r| r.role == DepRole::Address) {
        restore_address(inner, target, row, &index_map)?;
    }
    for row in set.rows.iter().filter(|r| r.role == DepRole::Route) {
        restore_route(inner, target, row, &index_map)?;
    }
    Ok(())
}

fn decode<E: serde::de::DeserializeOwned>(row: &SnapshotRow) -> Result<E, Error> {
    from_row(&row.row).ok_or_else(|| Error::InvalidState("corrupt snapshot row".to_string()))
}

fn find_link(
    inner: &Arc<NdbInner>,
    target: &Target,
    ifname: &str,
) -> Result<Option<LinkRecord>, Error> {
    let mut spec = Match::new();
    spec.insert("ifname".to_string(), json!(ifname));
    select_one::<LinkRecord>(inner, target, &spec)
}

fn restore_root_link(
    inner: &Arc<NdbInner>,
    target: &Target,
    row: &SnapshotRow,
    index_map: &mut BTreeMap<u32, u32>,
) -> Result<(), Error> {
    let saved: LinkRecord = decode(row)?;
    match find_link(inner, target, &saved.ifname)? {
        Some(existing) => {
            index_map.insert(saved.index, existing.index);
            let mut changes = LinkChanges::default();
            let mut confirm = Match::new();
            confirm.insert("ifname".to_string(), json!(saved.ifname));
            // Only the administrative bit is restored; the kernel owns
            // the operational flags.
            if (existing.flags ^ saved.flags) & IFF_UP != 0 {
                changes.flags = Some((saved.flags, IFF_UP));
                confirm.insert("state".to_string(), json!(saved.state));
            }
            if existing.master != saved.master {
                let want = saved.master.map(|m| *index_map.get(&m).unwrap_or(&m));
                changes.master = Some(want.unwrap_or(0));
                confirm.insert("master".to_string(), json!(want));
            }
            if existing.mtu != saved.mtu {
                if let Some(mtu) = saved.mtu {
                    changes.mtu = Some(mtu);
                    confirm.insert("mtu".to_string(), json!(mtu));
                }
            }
            if !changes.is_empty() {
                debug!(target = %target, ifname = %saved.ifname, "rolling back link attributes");
                apply_and_confirm(
                    inner,
                    target,
                    RtnlRequest::SetLink { index: existing.index, changes },
                    EntityKind::Link,
                    WaitCond::Appear(confirm),
                )?;
            }
        }
        None => {
            // Recreate under the saved name; the kernel assigns a fresh
            // index, so dependents are rewritten through the map.
            let mut spec = saved.clone();
            spec.index = 0;
            spec.master = None;
            let mut confirm = Match::new();
            confirm.insert("ifname".to_string(), json!(saved.ifname));
            debug!(target = %target, ifname = %saved.ifname, "recreating removed link");
            apply_and_confirm(
                inner,
                target,
                RtnlRequest::AddLink(spec),
                EntityKind::Link,
                WaitCond::Appear(confirm.clone()),
            )?;
            let new = select_one::<LinkRecord>(inner, target, &confirm)?
                .ok_or_else(|| Error::NotFound(saved.ifname.clone()))?;
            index_map.insert(saved.index, new.index);
        }
    }
    Ok(())
}

fn restore_port(
    inner: &Arc<NdbInner>,
    target: &Target,
    row: &SnapshotRow,
    index_map: &BTreeMap<u32, u32>,
) -> Result<(), Error> {
    let saved: LinkRecord = decode(row)?;
    let want_master = saved.master.map(|m| *index_map.get(&m).unwrap_or(&m));
    let existing = match find_link(inner, target, &saved.ifname)? {
        Some(existing) => existing,
        None => {
            // A virtual port vanished with its bridge; recreate it
            // already enslaved.
            if saved.kind.is_none() {
                return Ok(());
            }
            let mut spec = saved.clone();
            spec.index = 0;
            spec.master = want_master;
            let mut confirm = Match::new();
            confirm.insert("ifname".to_string(), json!(saved.ifname));
            apply_and_confirm(
                inner,
                target,
                RtnlRequest::AddLink(spec),
                EntityKind::Link,
                WaitCond::Appear(confirm),
            )?;
            return Ok(());
        }
    };
    if existing.master != want_master {
        let mut confirm = Match::new();
        confirm.insert("ifname".to_string(), json!(saved.ifname));
        confirm.insert("master".to_string(), json!(want_master));
        apply_and_confirm(
            inner,
            target,
            RtnlRequest::SetLink {
                index: existing.index,
                changes: LinkChanges { master: Some(want_master.unwrap_or(0)), ..LinkChanges::default() },
            },
            EntityKind::Link,
            WaitCond::Appear(confirm),
        )?;
    }
    Ok(())
}

fn restore_vlan_child(
    inner: &Arc<NdbInner>,
    target: &Target,
    row: &SnapshotRow,
    index_map: &BTreeMap<u32, u32>,
) -> Result<(), Error> {
    let saved: LinkRecord = decode(row)?;
    if find_link(inner, target, &saved.ifname)?.is_some() {
        return Ok(());
    }
    let mut spec = saved.clone();
    spec.index = 0;
    spec.link = saved.link.map(|l| *index_map.get(&l).unwrap_or(&l));
    let mut confirm = Match::new();
    confirm.insert("ifname".to_string(), json!(saved.ifname));
    apply_and_confirm(
        inner,
        target,
        RtnlRequest::AddLink(spec),
        EntityKind::Link,
        WaitCond::Appear(confirm),
    )?;
    Ok(())
}

fn restore_address(
    inner: &Arc<NdbInner>,
    target: &Target,
    row: &SnapshotRow,
    index_map: &BTreeMap<u32, u32>,
) -> Result<(), Error> {
    let mut saved: AddressRecord = decode(row)?;
    if let Some(new) = index_map.get(&saved.index) {
        saved.index = *new;
    }
    let mut confirm = Match::new();
    confirm.insert("index".to_string(), json!(saved.index));
    confirm.insert("address".to_string(), json!(saved.address));
    confirm.insert("prefixlen".to_string(), json!(saved.prefixlen));
    if select_one::<AddressRecord>(inner, target, &confirm)?.is_some() {
        return Ok(());
    }
    apply_and_confirm(
        inner,
        target,
        RtnlRequest::AddAddress(saved),
        EntityKind::Address,
        WaitCond::Appear(confirm),
    )?;
    Ok(())
}

fn restore_route(
    inner: &Arc<NdbInner>,
    target: &Target,
    row: &SnapshotRow,
    index_map: &BTreeMap<u32, u32>,
) -> Result<(), Error> {
    let mut saved: RouteRecord = decode(row)?;
    if let Some(oif) = saved.oif {
        saved.oif = Some(*index_map.get(&oif).unwrap_or(&oif));
    }
    let confirm = RouteRecord::natural_key(&saved);
    if select_one::<RouteRecord>(inner, target, &confirm)?.is_some() {
        return Ok(());
    }
    apply_and_confirm(
        inner,
        target,
        RtnlRequest::AddRoute(saved),
        EntityKind::Route,
        WaitCond::Appear(confirm),
    )?;
    Ok(())
}

fn restore_neighbour(
    inner: &Arc<NdbInner>,
    target: &Target,
    row: &SnapshotRow,
    index_map: &BTreeMap<u32, u32>,
) -> Result<(), Error> {
    let mut saved: NeighbourRecord = decode(row)?;
    if let Some(new) = index_map.get(&saved.ifindex) {
        saved.ifindex = *new;
    }
    let mut confirm = Match::new();
    confirm.insert("ifindex".to_string(), json!(saved.ifindex));
    confirm.insert("dst".to_string(), json!(saved.dst));
    if select_one::<NeighbourRecord>(inner, target, &confirm)?.is_some() {
        return Ok(());
    }
    apply_and_confirm(
        inner,
        target,
        RtnlRequest::AddNeighbour(saved),
        EntityKind::Neighbour,
        WaitCond::Appear(confirm),
    )?;
    Ok(())
}

fn restore_rule(inner: &Arc<NdbInner>, target: &Target, row: &SnapshotRow) -> Result<(), Error> {
    let saved: RuleRecord = decode(row)?;
    let confirm = RuleRecord::natural_key(&saved);
    if select_one::<RuleRecord>(inner, target, &confirm)?.is_some() {
        return Ok(());
    }
    apply_and_confirm(
        inner,
        target,
        RtnlRequest::AddRule(saved),
        EntityKind::Rule,
        WaitCond::Appear(confirm),
    )?;
    Ok(())
}
