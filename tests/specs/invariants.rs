// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-table invariants checked against a live database.

use crate::prelude::*;

#[test]
fn bridge_and_vlan_rows_are_mirrored() {
    let (db, _kernel) = open_with_fake();
    db.interfaces()
        .create(json!({"ifname": "br0", "kind": "bridge"}))
        .unwrap()
        .commit()
        .unwrap();
    db.interfaces()
        .create(json!({"ifname": "d0", "kind": "dummy"}))
        .unwrap()
        .commit()
        .unwrap();
    db.interfaces()
        .create(json!({"ifname": "v100", "kind": "vlan", "link": db.interfaces().require("d0").unwrap().get("index"), "vlan_id": 100}))
        .unwrap()
        .commit()
        .unwrap();

    let handle = db.store();
    let store = handle.read(SPEC_WAIT).unwrap();
    // Every bridge/vlan interface row has a mirror row with the same key.
    for ((target, index), record) in store.bridges.iter() {
        let main = store.links.get(target, index).unwrap();
        assert_eq!(main.record.ifname, record.ifname);
        assert_eq!(main.record.kind.as_deref(), Some("bridge"));
    }
    for ((target, index), record) in store.vlans.iter() {
        let main = store.links.get(target, index).unwrap();
        assert_eq!(main.record.ifname, record.ifname);
        assert_eq!(main.record.kind.as_deref(), Some("vlan"));
    }
    assert_eq!(store.bridges.len(), 1);
    assert_eq!(store.vlans.len(), 1);
    drop(store);
    db.close();
}

#[test]
fn every_address_row_has_an_owning_interface() {
    let (db, _kernel) = open_with_fake();
    for (ifname, ip) in [("d0", "10.0.0.2"), ("d1", "10.1.0.2")] {
        db.interfaces()
            .create(json!({"ifname": ifname, "kind": "dummy"}))
            .unwrap()
            .commit()
            .unwrap();
        db.interfaces().require(ifname).unwrap().add_address(ip, 24).unwrap();
    }

    let handle = db.store();
    let store = handle.read(SPEC_WAIT).unwrap();
    for ((target, _), row) in store.addresses.iter() {
        assert!(
            store.links.get(target, &row.record.index).is_some(),
            "orphan address row {:?}",
            row.record
        );
    }
    drop(store);
    db.close();
}

#[test]
fn summary_round_trips_between_formats() {
    let (db, _kernel) = open_with_fake();
    for i in 0..4 {
        db.interfaces()
            .create(json!({"ifname": format!("d{i}"), "kind": "dummy"}))
            .unwrap()
            .commit()
            .unwrap();
    }

    let report = db.interfaces().summary().unwrap();
    let json_rows = report.to_json();
    let json_len = json_rows.as_array().unwrap().len();
    let plain_records = report.to_string().lines().count() - 1;
    assert_eq!(json_len, plain_records);

    let width = report.header().len();
    for line in report.to_csv().lines() {
        assert_eq!(line.split(',').count(), width);
    }
    db.close();
}

#[test]
fn vlan_children_vanish_with_their_parent() {
    let (db, kernel) = open_with_fake();
    db.interfaces()
        .create(json!({"ifname": "d0", "kind": "dummy"}))
        .unwrap()
        .commit()
        .unwrap();
    let parent_index = db.interfaces().require("d0").unwrap().get("index");
    db.interfaces()
        .create(json!({"ifname": "v100", "kind": "vlan", "link": parent_index, "vlan_id": 100}))
        .unwrap()
        .commit()
        .unwrap();

    db.interfaces().require("d0").unwrap().remove().commit().unwrap();

    assert!(!kernel.has_link("v100"));
    assert!(db.interfaces().get("v100").unwrap().is_none());
    let handle = db.store();
    assert!(handle.read(SPEC_WAIT).unwrap().vlans.is_empty());
    db.close();
}
