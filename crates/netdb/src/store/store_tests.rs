// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;
use netdb_core::{DepRole, Entity};

fn link(index: u32, ifname: &str, kind: Option<&str>) -> LinkRecord {
    let mut rec = LinkRecord::default();
    rec.index = index;
    rec.ifname = ifname.to_string();
    rec.kind = kind.map(str::to_string);
    rec
}

fn address(index: u32, ip: &str, prefixlen: u8) -> AddressRecord {
    AddressRecord::new(index, ip.parse().unwrap(), prefixlen)
}

fn target(label: &str) -> Target {
    Target::new(label)
}

#[test]
fn upsert_link_mirrors_bridge_and_vlan_tables() {
    let mut store = Store::default();
    let t = target("localhost");
    store.upsert_link(&t, link(1, "br0", Some("bridge")));
    store.upsert_link(&t, link(2, "v100", Some("vlan")));
    store.upsert_link(&t, link(3, "d0", Some("dummy")));

    assert!(store.bridges.contains_key(&(t.clone(), 1)));
    assert!(store.vlans.contains_key(&(t.clone(), 2)));
    assert!(!store.bridges.contains_key(&(t.clone(), 3)));
    assert_eq!(store.links.count(Some(&t)), 3);
}

#[test]
fn upsert_link_refreshes_mirror_on_kind_change() {
    let mut store = Store::default();
    let t = target("localhost");
    store.upsert_link(&t, link(1, "x0", Some("bridge")));
    store.upsert_link(&t, link(1, "x0", Some("dummy")));
    assert!(!store.bridges.contains_key(&(t, 1)));
}

#[test]
fn delete_link_cascades_dependents() {
    let mut store = Store::default();
    let t = target("localhost");
    store.upsert_link(&t, link(1, "d0", Some("dummy")));
    store.addresses.upsert(&t, address(1, "10.0.0.2", 24));
    store.addresses.upsert(&t, address(1, "10.0.0.3", 24));
    let mut route = RouteRecord::default();
    route.dst = Some("10.0.1.0".parse().unwrap());
    route.dst_len = 24;
    route.oif = Some(1);
    store.routes.upsert(&t, route);

    store.delete_link(&t, 1);

    assert_eq!(store.links.count(Some(&t)), 0);
    assert_eq!(store.addresses.count(Some(&t)), 0);
    assert_eq!(store.routes.count(Some(&t)), 0);
}

#[test]
fn flush_target_leaves_other_targets_alone() {
    let mut store = Store::default();
    let a = target("a");
    let b = target("b");
    store.upsert_link(&a, link(1, "a0", Some("bridge")));
    store.upsert_link(&b, link(1, "b0", Some("bridge")));
    store.addresses.upsert(&a, address(1, "10.0.0.2", 24));

    store.flush_target(&a);

    assert_eq!(store.links.count(Some(&a)), 0);
    assert_eq!(store.addresses.count(Some(&a)), 0);
    assert!(store.bridges.keys().all(|(t, _)| *t == b));
    assert_eq!(store.links.count(Some(&b)), 1);
}

#[test]
fn mark_failed_tombstones_every_row_of_the_target() {
    let mut store = Store::default();
    let t = target("localhost");
    store.upsert_link(&t, link(1, "d0", None));
    store.addresses.upsert(&t, address(1, "10.0.0.2", 24));

    store.mark_failed(&t);

    let row = store.links.get(&t, &1).unwrap();
    assert_eq!(row.tflags & TFLAG_TOMBSTONE, TFLAG_TOMBSTONE);
    let key = address(1, "10.0.0.2", 24).key();
    assert_eq!(store.addresses.get(&t, &key).unwrap().tflags & TFLAG_TOMBSTONE, TFLAG_TOMBSTONE);
}

#[test]
fn snapshot_flags_members_and_their_owning_link() {
    let mut store = Store::default();
    let t = target("localhost");
    store.upsert_link(&t, link(1, "d0", None));
    let addr = address(1, "10.0.0.2", 24);
    store.addresses.upsert(&t, addr.clone());

    let rows = vec![SnapshotRow::new(
        EntityKind::Address,
        DepRole::Address,
        addr.to_row(),
    )];
    store.insert_snapshot("ctx1", &t, rows);

    // Reverse walk: flag on the address propagates to the owning link.
    assert_eq!(store.links.get(&t, &1).unwrap().tflags & TFLAG_IN_FLIGHT, TFLAG_IN_FLIGHT);
    assert_eq!(
        store.addresses.get(&t, &addr.key()).unwrap().tflags & TFLAG_IN_FLIGHT,
        TFLAG_IN_FLIGHT
    );

    store.drop_snapshot("ctx1");
    assert_eq!(store.links.get(&t, &1).unwrap().tflags, 0);
    assert!(store.snapshots.is_empty());
}

#[test]
fn select_filters_by_spec_and_target() {
    let mut store = Store::default();
    let a = target("a");
    let b = target("b");
    store.upsert_link(&a, link(1, "eth0", None));
    store.upsert_link(&b, link(1, "eth0", None));

    let mut spec = Match::new();
    spec.insert("ifname".to_string(), json!("eth0"));
    assert_eq!(store.links.select(None, &spec).len(), 2);
    assert_eq!(store.links.select(Some(&a), &spec).len(), 1);

    spec.insert("index".to_string(), json!(9));
    assert!(store.links.select(None, &spec).is_empty());
}

#[test]
fn upsert_preserves_tflags() {
    let mut store = Store::default();
    let t = target("localhost");
    store.upsert_link(&t, link(1, "d0", None));
    store.links.flag_row(&t, &1, TFLAG_IN_FLIGHT, true);
    store.upsert_link(&t, link(1, "d0-renamed", None));
    let row = store.links.get(&t, &1).unwrap();
    assert_eq!(row.tflags, TFLAG_IN_FLIGHT);
    assert_eq!(row.record.ifname, "d0-renamed");
}

#[test]
fn read_gate_blocks_readers_until_open() {
    let handle = StoreHandle::new();
    handle.read_gate.close();
    assert!(handle.read(std::time::Duration::from_millis(10)).is_err());
    handle.read_gate.open();
    assert!(handle.read(std::time::Duration::from_millis(10)).is_ok());
}
