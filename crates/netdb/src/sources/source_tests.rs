// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::testkit::{open_with_fake, wait_until, SPEC_WAIT};
use crate::{Netdb, Options, SourceSpec};

use netdb_core::{LinkRecord, RtnlRequest};
use netdb_rtnl::FakeKernel;

fn dummy(ifname: &str) -> RtnlRequest {
    let mut spec = LinkRecord::default();
    spec.ifname = ifname.to_string();
    spec.kind = Some("dummy".to_string());
    RtnlRequest::AddLink(spec)
}

#[test]
fn initial_load_reflects_preexisting_state() {
    let kernel = FakeKernel::new();
    kernel.apply(&dummy("pre0")).unwrap();
    kernel.apply(&dummy("pre1")).unwrap();

    let options = Options::default()
        .no_default_sources()
        .transport("local", Arc::new(kernel.transport()))
        .source(SourceSpec::local());
    let db = Netdb::open(options).unwrap();

    // add() blocked on the sync marker, so the dump is already applied.
    assert_eq!(db.interfaces().count().unwrap(), 2);
    assert!(db.interfaces().get("pre0").unwrap().is_some());
    db.close();
}

#[test]
fn source_reaches_running_after_add() {
    let (db, _kernel) = open_with_fake();
    assert_eq!(db.sources().state("localhost"), Some(SourceState::Running));
    db.close();
}

#[test]
fn spontaneous_events_land_in_the_store() {
    let (db, kernel) = open_with_fake();
    kernel.apply(&dummy("late0")).unwrap();
    let object = db.interfaces().wait(json!({"ifname": "late0"}), None).unwrap();
    assert_eq!(object.get("kind"), Some(json!("dummy")));
    db.close();
}

#[test]
fn persistent_source_recovers_from_connection_loss() {
    let (db, kernel) = open_with_fake();
    kernel.apply(&dummy("d0")).unwrap();
    assert!(db.interfaces().wait(json!({"ifname": "d0"}), None).is_ok());

    kernel.fail_connections();
    assert!(wait_until(SPEC_WAIT, || {
        db.sources().state("localhost") == Some(SourceState::Running)
    }));

    // The reconnected source re-dumps the kernel state; the reload is
    // applied asynchronously behind the running state.
    assert!(wait_until(SPEC_WAIT, || {
        db.interfaces().count().is_ok_and(|n| n == 1)
    }));

    // And still forwards events.
    kernel.apply(&dummy("d1")).unwrap();
    assert!(db.interfaces().wait(json!({"ifname": "d1"}), None).is_ok());
    db.close();
}

#[test]
fn non_persistent_source_stops_on_failure() {
    let kernel = FakeKernel::new();
    let options = Options::default()
        .no_default_sources()
        .source_fail_pause(Duration::from_millis(50))
        .transport("local", Arc::new(kernel.transport()))
        .source(SourceSpec::local().persistent(false));
    let db = Netdb::open(options).unwrap();

    kernel.fail_connections();
    assert!(wait_until(SPEC_WAIT, || {
        db.sources().state("localhost") == Some(SourceState::Stopped)
    }));
    db.close();
}

#[test]
fn restart_revives_a_stopped_source() {
    let kernel = FakeKernel::new();
    let options = Options::default()
        .no_default_sources()
        .source_fail_pause(Duration::from_millis(50))
        .transport("local", Arc::new(kernel.transport()))
        .source(SourceSpec::local().persistent(false));
    let db = Netdb::open(options).unwrap();
    kernel.fail_connections();
    assert!(wait_until(SPEC_WAIT, || {
        db.sources().state("localhost") == Some(SourceState::Stopped)
    }));

    // restart() overrides the non-persistent stop and reconnects.
    db.sources().restart("localhost", "test").unwrap();
    assert!(wait_until(SPEC_WAIT, || {
        db.sources().state("localhost") == Some(SourceState::Running)
    }));
    db.close();
}

#[test]
fn restart_reloads_kernel_state() {
    let (db, kernel) = open_with_fake();
    kernel.apply(&dummy("d0")).unwrap();
    assert!(db.interfaces().wait(json!({"ifname": "d0"}), None).is_ok());

    db.sources().restart("localhost", "test").unwrap();
    assert!(wait_until(SPEC_WAIT, || {
        db.sources().state("localhost") == Some(SourceState::Running)
    }));
    assert!(wait_until(SPEC_WAIT, || {
        db.interfaces().count().is_ok_and(|n| n == 1)
    }));
    db.close();
}

#[test]
fn api_propagates_kernel_errors_unchanged() {
    let (db, _kernel) = open_with_fake();
    let mut bogus = LinkRecord::default();
    bogus.ifname = "x0".to_string();
    bogus.kind = Some("nosuch".to_string());
    let source = db.inner_source_for_test("localhost");
    let err = source
        .api("link:add", |ch| ch.submit(&RtnlRequest::AddLink(bogus.clone())))
        .unwrap_err();
    match err {
        netdb_core::Error::Netlink { code, .. } => assert_eq!(code, 95),
        other => panic!("unexpected error {other}"),
    }
    db.close();
}
