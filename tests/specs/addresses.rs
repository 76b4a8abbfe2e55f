// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chained address add/delete on one interface.

use crate::prelude::*;

#[test]
fn add_then_delete_two_addresses() {
    let (db, kernel) = open_with_fake();
    db.interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy", "state": "up"}))
        .unwrap()
        .commit()
        .unwrap();

    let dummy = db.interfaces().require("dummy0").unwrap();
    dummy.add_address("10.0.0.2", 24).unwrap();
    dummy.add_address("10.0.0.3", 24).unwrap();

    assert!(kernel.has_address("dummy0", "10.0.0.2", 24));
    assert!(kernel.has_address("dummy0", "10.0.0.3", 24));
    assert_eq!(dummy.addresses().unwrap().count().unwrap(), 2);

    dummy.del_address("10.0.0.2", 24).unwrap();
    dummy.del_address("10.0.0.3", 24).unwrap();

    assert!(kernel.addresses_of("dummy0").is_empty());
    assert_eq!(dummy.addresses().unwrap().count().unwrap(), 0);
    assert_eq!(db.addresses().count().unwrap(), 0);
    db.close();
}

#[test]
fn address_lookup_by_scalar_key() {
    let (db, _kernel) = open_with_fake();
    db.interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy"}))
        .unwrap()
        .commit()
        .unwrap();
    let dummy = db.interfaces().require("dummy0").unwrap();
    dummy.add_address("10.0.0.2", 24).unwrap();

    let addr = db.addresses().require("10.0.0.2/24").unwrap();
    assert_eq!(addr.get("prefixlen"), Some(json!(24)));
    assert_eq!(addr.get("family"), Some(json!(2)));
    db.close();
}

#[test]
fn removing_the_interface_cascades_addresses() {
    let (db, kernel) = open_with_fake();
    db.interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy"}))
        .unwrap()
        .commit()
        .unwrap();
    let dummy = db.interfaces().require("dummy0").unwrap();
    dummy.add_address("10.0.0.2", 24).unwrap();

    db.interfaces().require("dummy0").unwrap().remove().commit().unwrap();

    assert!(!kernel.has_link("dummy0"));
    assert_eq!(db.addresses().count().unwrap(), 0);
    db.close();
}
