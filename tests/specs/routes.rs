// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static routes with a gateway.

use crate::prelude::*;

fn up_dummy_with_address(db: &Netdb) {
    db.interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy", "state": "up"}))
        .unwrap()
        .commit()
        .unwrap();
    db.interfaces()
        .require("dummy0")
        .unwrap()
        .add_address("10.0.0.2", 24)
        .unwrap();
}

#[test]
fn static_route_via_gateway_is_associated_with_the_interface() {
    let (db, kernel) = open_with_fake();
    up_dummy_with_address(&db);

    db.routes()
        .create(json!({"dst": "10.0.1.0/24", "gateway": "10.0.0.1"}))
        .unwrap()
        .commit()
        .unwrap();

    assert!(kernel.has_route("10.0.1.0", 24));
    let route = db.routes().require("10.0.1.0/24").unwrap();
    let dummy = db.interfaces().require("dummy0").unwrap();
    assert_eq!(route.get("oif"), dummy.get("index"));
    assert_eq!(dummy.routes().unwrap().count().unwrap(), 1);
    db.close();
}

#[test]
fn unreachable_gateway_is_rejected() {
    let (db, _kernel) = open_with_fake();
    up_dummy_with_address(&db);

    let err = db
        .routes()
        .create(json!({"dst": "10.0.1.0/24", "gateway": "192.168.50.1"}))
        .unwrap()
        .commit()
        .unwrap_err();
    match err {
        Error::Netlink { code, .. } => assert_eq!(code, 101),
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(db.routes().count().unwrap(), 0);
    db.close();
}

#[test]
fn route_remove_commit_deletes_the_row() {
    let (db, kernel) = open_with_fake();
    up_dummy_with_address(&db);
    db.routes()
        .create(json!({"dst": "10.0.1.0/24", "gateway": "10.0.0.1"}))
        .unwrap()
        .commit()
        .unwrap();

    db.routes().require("10.0.1.0/24").unwrap().remove().commit().unwrap();
    assert!(!kernel.has_route("10.0.1.0", 24));
    assert_eq!(db.routes().count().unwrap(), 0);
    db.close();
}

#[test]
fn same_destination_routes_differ_by_priority() {
    let (db, kernel) = open_with_fake();
    up_dummy_with_address(&db);

    for priority in [100, 200] {
        db.routes()
            .create(json!({"dst": "10.0.1.0/24", "gateway": "10.0.0.1", "priority": priority}))
            .unwrap()
            .commit()
            .unwrap();
    }
    assert_eq!(db.routes().count().unwrap(), 2);

    // Deleting one metric is confirmed even though the sibling still
    // matches the prefix, and the sibling survives.
    db.routes()
        .constrain("priority", json!(100))
        .require("10.0.1.0/24")
        .unwrap()
        .remove()
        .commit()
        .unwrap();

    assert_eq!(db.routes().count().unwrap(), 1);
    let survivor = db.routes().require("10.0.1.0/24").unwrap();
    assert_eq!(survivor.get("priority"), Some(json!(200)));
    assert!(kernel.has_route("10.0.1.0", 24));
    db.close();
}

#[test]
fn route_keys_accept_dict_and_string_forms() {
    let (db, _kernel) = open_with_fake();
    up_dummy_with_address(&db);
    db.routes()
        .create(json!({"dst": "10.0.1.0/24", "gateway": "10.0.0.1", "table": 24000}))
        .unwrap()
        .commit()
        .unwrap();

    let by_map = db
        .routes()
        .require(json!({"dst": "10.0.1.0", "dst_len": 24, "table": 24000}))
        .unwrap();
    let by_string = db
        .routes()
        .constrain("table", json!(24000))
        .require("10.0.1.0/24")
        .unwrap();
    assert_eq!(by_map.get("table"), by_string.get("table"));
    db.close();
}
