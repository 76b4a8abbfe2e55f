// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the crate's unit tests: databases wired to the
//! in-process fake kernel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use netdb_rtnl::FakeKernel;

use crate::{Netdb, Options, SourceSpec};

pub(crate) const SPEC_WAIT: Duration = Duration::from_secs(5);

/// A database with one `localhost` source backed by a fake kernel.
pub(crate) fn open_with_fake() -> (Netdb, FakeKernel) {
    let kernel = FakeKernel::new();
    let options = Options::default()
        .no_default_sources()
        .rtnl_timeout(SPEC_WAIT)
        .source_fail_pause(Duration::from_millis(50))
        .transport("local", Arc::new(kernel.transport()))
        .source(SourceSpec::local());
    let db = match Netdb::open(options) {
        Ok(db) => db,
        Err(e) => panic!("open failed: {e}"),
    };
    (db, kernel)
}

/// A database with two sources, each backed by its own fake kernel.
pub(crate) fn open_two_targets() -> (Netdb, FakeKernel, FakeKernel) {
    let kernel_a = FakeKernel::new();
    let kernel_b = FakeKernel::new();
    let options = Options::default()
        .no_default_sources()
        .rtnl_timeout(SPEC_WAIT)
        .source_fail_pause(Duration::from_millis(50))
        .transport("fake-a", Arc::new(kernel_a.transport()))
        .transport("fake-b", Arc::new(kernel_b.transport()))
        .source(SourceSpec::new().kind("fake-a").target("a"))
        .source(SourceSpec::new().kind("fake-b").target("b"));
    let db = match Netdb::open(options) {
        Ok(db) => db,
        Err(e) => panic!("open failed: {e}"),
    };
    (db, kernel_a, kernel_b)
}

/// Poll until `cond` holds. Returns `false` on timeout.
pub(crate) fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
