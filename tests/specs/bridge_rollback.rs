// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remove a bridge with ports, addresses, and a route, then roll the
//! whole subtree back from the commit snapshot.

use crate::prelude::*;

/// br0 with ports p0/p1, two addresses, and one route through it.
fn build_bridge(db: &Netdb) {
    db.interfaces()
        .create(json!({"ifname": "br0", "kind": "bridge", "state": "up"}))
        .unwrap()
        .commit()
        .unwrap();
    for port in ["p0", "p1"] {
        db.interfaces()
            .create(json!({"ifname": port, "kind": "dummy"}))
            .unwrap()
            .commit()
            .unwrap();
    }
    let bridge = db.interfaces().require("br0").unwrap();
    bridge.add_port("p0").unwrap();
    bridge.add_port("p1").unwrap();
    bridge.add_address("10.0.0.2", 24).unwrap();
    bridge.add_address("10.0.0.3", 24).unwrap();
    db.routes()
        .create(json!({"dst": "10.0.1.0/24", "gateway": "10.0.0.1"}))
        .unwrap()
        .commit()
        .unwrap();
}

#[test]
fn bridge_remove_then_rollback_restores_everything() {
    let (db, kernel) = open_with_fake();
    build_bridge(&db);

    let old_index = kernel.link("br0").unwrap().index;

    let mut bridge = db.interfaces().require("br0").unwrap();
    bridge.remove().commit().unwrap();

    assert!(!kernel.has_link("br0"));
    assert!(kernel.addresses_of("br0").is_empty());
    assert!(!kernel.has_route("10.0.1.0", 24));
    assert_eq!(kernel.link("p0").unwrap().master, None);
    assert!(db.interfaces().get("br0").unwrap().is_none());
    assert_eq!(db.addresses().count().unwrap(), 0);

    bridge.rollback().unwrap();

    // All five kernel objects are back; the index may differ, so every
    // check goes through the stable name.
    let restored = kernel.link("br0").unwrap();
    assert!(restored.is_up());
    assert_ne!(restored.index, old_index);
    assert_eq!(kernel.link("p0").unwrap().master, Some(restored.index));
    assert_eq!(kernel.link("p1").unwrap().master, Some(restored.index));
    assert!(kernel.has_address("br0", "10.0.0.2", 24));
    assert!(kernel.has_address("br0", "10.0.0.3", 24));
    assert!(kernel.has_route("10.0.1.0", 24));

    // The store caught up through the echo events.
    let row = db.interfaces().require("br0").unwrap();
    assert_eq!(row.get("state"), Some(json!("up")));
    assert_eq!(row.ports().unwrap().count().unwrap(), 2);
    assert_eq!(row.addresses().unwrap().count().unwrap(), 2);
    assert_eq!(row.routes().unwrap().count().unwrap(), 1);
    db.close();
}

#[test]
fn rollback_observables_match_the_precommit_state() {
    let (db, kernel) = open_with_fake();
    build_bridge(&db);

    let before = db.interfaces().require("br0").unwrap();
    let before_state = before.get("state");
    let before_ports = before.ports().unwrap().count().unwrap();

    let mut bridge = db.interfaces().require("br0").unwrap();
    bridge.remove().commit().unwrap();
    bridge.rollback().unwrap();

    // Natural-key comparison: the index is reallocated, everything the
    // user can observe by name is unchanged.
    let after = db.interfaces().require("br0").unwrap();
    assert_eq!(after.get("state"), before_state);
    assert_eq!(after.ports().unwrap().count().unwrap(), before_ports);
    assert_eq!(after.get("kind"), Some(json!("bridge")));
    assert!(kernel.has_link("br0"));
    db.close();
}
