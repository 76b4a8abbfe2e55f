// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-target flush semantics with two independent sources.

use crate::prelude::*;

fn seed(db: &Netdb, target: &str) {
    db.interfaces()
        .on(target)
        .create(json!({"ifname": "d0", "kind": "dummy", "state": "up"}))
        .unwrap()
        .commit()
        .unwrap();
    db.interfaces()
        .on(target)
        .require("d0")
        .unwrap()
        .add_address("10.0.0.2", 24)
        .unwrap();
}

#[test]
fn closing_one_source_flushes_only_its_rows() {
    let (db, kernel_a, kernel_b) = open_two_targets();
    seed(&db, "a");
    seed(&db, "b");

    assert_eq!(db.interfaces().count().unwrap(), 2);
    assert_eq!(db.addresses().count().unwrap(), 2);

    db.sources().remove("a", true).unwrap();

    assert_eq!(db.interfaces().on("a").count().unwrap(), 0);
    assert_eq!(db.addresses().on("a").count().unwrap(), 0);
    assert_eq!(db.interfaces().on("b").count().unwrap(), 1);
    assert_eq!(db.addresses().on("b").count().unwrap(), 1);

    // Flushing the database does not touch either kernel.
    assert!(kernel_a.has_link("d0"));
    assert!(kernel_b.has_link("d0"));
    db.close();
}

#[test]
fn same_name_on_two_targets_stays_distinct() {
    let (db, _kernel_a, _kernel_b) = open_two_targets();
    seed(&db, "a");
    seed(&db, "b");

    let a0 = db.interfaces().on("a").require("d0").unwrap();
    let b0 = db.interfaces().on("b").require("d0").unwrap();
    assert_eq!(a0.target().as_str(), "a");
    assert_eq!(b0.target().as_str(), "b");

    // Mutating through one target leaves the other alone.
    let mut a0 = a0;
    a0.set("state", json!("down")).unwrap().commit().unwrap();
    assert_eq!(
        db.interfaces().on("b").require("d0").unwrap().get("state"),
        Some(json!("up"))
    );
    db.close();
}

#[test]
fn dumps_interleave_but_reports_cover_both() {
    let (db, _kernel_a, _kernel_b) = open_two_targets();
    seed(&db, "a");
    seed(&db, "b");

    let report = db.interfaces().summary().unwrap();
    assert_eq!(report.len(), 2);
    let text = report.to_string();
    assert!(text.lines().any(|l| l.starts_with("a ")));
    assert!(text.lines().any(|l| l.starts_with("b ")));
    db.close();
}
