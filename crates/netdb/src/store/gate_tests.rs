// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;

#[test]
fn open_gate_passes_immediately() {
    let gate = Gate::new(true);
    assert!(gate.wait_open(Duration::from_millis(1)));
}

#[test]
fn closed_gate_times_out() {
    let gate = Gate::new(false);
    assert!(!gate.wait_open(Duration::from_millis(10)));
}

#[test]
fn opening_wakes_waiters() {
    let gate = Arc::new(Gate::new(false));
    let waiter = {
        let gate = Arc::clone(&gate);
        std::thread::spawn(move || gate.wait_open(Duration::from_secs(5)))
    };
    std::thread::sleep(Duration::from_millis(20));
    gate.open();
    assert!(waiter.join().unwrap());
}

#[test]
fn gate_can_close_again() {
    let gate = Gate::new(true);
    gate.close();
    assert!(!gate.is_open());
    gate.open();
    assert!(gate.is_open());
}
