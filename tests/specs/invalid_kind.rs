// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A create with a kind the kernel cannot build fails with errno 95 and
//! leaves no trace anywhere.

use crate::prelude::*;

#[test]
fn bogus_kind_fails_with_95_and_leaves_no_row() {
    let (db, kernel) = open_with_fake();
    let mut object = db
        .interfaces()
        .create(json!({"ifname": "x", "kind": "nosuch"}))
        .unwrap();

    let err = object.commit().unwrap_err();
    match err {
        Error::Netlink { code, .. } => assert_eq!(code, 95),
        other => panic!("unexpected error {other}"),
    }

    assert_eq!(object.state(), ObjectState::Invalid);
    assert!(!kernel.has_link("x"));
    assert!(db.interfaces().get("x").unwrap().is_none());
    db.close();
}

#[test]
fn staging_survives_so_the_caller_can_retry() {
    let (db, kernel) = open_with_fake();
    let mut object = db
        .interfaces()
        .create(json!({"ifname": "x", "kind": "nosuch"}))
        .unwrap();
    assert!(object.commit().is_err());

    assert_eq!(object.get("ifname"), Some(json!("x")));
    assert_eq!(object.get("kind"), Some(json!("nosuch")));

    object.set("kind", json!("dummy")).unwrap();
    object.commit().unwrap();
    assert!(kernel.has_link("x"));
    assert_eq!(object.state(), ObjectState::System);
    db.close();
}
