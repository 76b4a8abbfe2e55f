// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot rows: copies of table rows keyed by a context id, used for
//! rollback of committed changes.

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::Value;

/// Why a row is part of a snapshot set. Determines restore order and how
/// stale interface indices are rewritten during rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepRole {
    /// The row the snapshot was taken for.
    Root,
    /// A port enslaved to the root (matched by `master`).
    Port,
    /// A VLAN child of the root (matched by `link`).
    VlanChild,
    /// An address owned by the root (matched by `index`).
    Address,
    /// A route leaving through the root (matched by `oif`).
    Route,
}

/// One saved row inside a snapshot set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub kind: EntityKind,
    pub role: DepRole,
    /// The full row as a JSON object.
    pub row: Value,
}

impl SnapshotRow {
    pub fn new(kind: EntityKind, role: DepRole, row: Value) -> Self {
        Self { kind, role, row }
    }
}
