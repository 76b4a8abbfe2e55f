// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Create and remove a dummy interface; the kernel and the store agree
//! at every step.

use crate::prelude::*;

#[test]
fn create_then_remove_dummy() {
    let (db, kernel) = open_with_fake();

    let mut dummy = db
        .interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy"}))
        .unwrap();
    dummy.commit().unwrap();

    assert!(kernel.has_link("dummy0"));
    let row = db.interfaces().require("dummy0").unwrap();
    assert_eq!(row.get("kind"), Some(json!("dummy")));
    assert_eq!(row.state(), ObjectState::System);

    db.interfaces().require("dummy0").unwrap().remove().commit().unwrap();

    assert!(!kernel.has_link("dummy0"));
    assert!(db.interfaces().get("dummy0").unwrap().is_none());
    db.close();
}

#[test]
fn create_starts_up_when_asked() {
    let (db, kernel) = open_with_fake();
    db.interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy", "state": "up"}))
        .unwrap()
        .commit()
        .unwrap();
    assert!(kernel.link("dummy0").unwrap().is_up());
    assert_eq!(
        db.interfaces().require("dummy0").unwrap().get("state"),
        Some(json!("up"))
    );
    db.close();
}

#[test]
fn duplicate_create_surfaces_eexist() {
    let (db, _kernel) = open_with_fake();
    db.interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy"}))
        .unwrap()
        .commit()
        .unwrap();
    let err = db
        .interfaces()
        .create(json!({"ifname": "dummy0", "kind": "dummy"}))
        .unwrap()
        .commit()
        .unwrap_err();
    match err {
        Error::Netlink { code, .. } => assert_eq!(code, 17),
        other => panic!("unexpected error {other}"),
    }
    db.close();
}
