// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event union flowing from sources to the database manager.

use std::collections::BTreeMap;

use crate::address::AddressRecord;
use crate::link::LinkRecord;
use crate::neighbour::NeighbourRecord;
use crate::route::RouteRecord;
use crate::rule::RuleRecord;
use crate::snapshot::SnapshotRow;
use crate::sync::SyncPoint;
use crate::Value;

/// One batch of events from one source. Batches are delivered atomically
/// and in FIFO order per source.
pub type EventBatch = Vec<RtnlEvent>;

/// A parsed RTNL message or a control sentinel.
///
/// Data variants mirror the RTNL message families one to one; control
/// variants drive the database manager itself.
#[derive(Debug, Clone)]
pub enum RtnlEvent {
    NewLink(LinkRecord),
    DelLink(LinkRecord),
    NewAddress(AddressRecord),
    DelAddress(AddressRecord),
    NewRoute(RouteRecord),
    DelRoute(RouteRecord),
    NewNeighbour(NeighbourRecord),
    DelNeighbour(NeighbourRecord),
    NewRule(RuleRecord),
    DelRule(RuleRecord),
    Control(ControlEvent),
}

impl RtnlEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RtnlEvent::NewLink(_) => "link:new",
            RtnlEvent::DelLink(_) => "link:del",
            RtnlEvent::NewAddress(_) => "address:new",
            RtnlEvent::DelAddress(_) => "address:del",
            RtnlEvent::NewRoute(_) => "route:new",
            RtnlEvent::DelRoute(_) => "route:del",
            RtnlEvent::NewNeighbour(_) => "neighbour:new",
            RtnlEvent::DelNeighbour(_) => "neighbour:del",
            RtnlEvent::NewRule(_) => "rule:new",
            RtnlEvent::DelRule(_) => "rule:del",
            RtnlEvent::Control(c) => c.name(),
        }
    }
}

/// Control sentinels consumed by the database manager in queue order.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// Rendezvous: signalled once every preceding event from the same
    /// source has been applied.
    Sync(SyncPoint),
    /// Close the schema read gate.
    ReadLock,
    /// Reopen the schema read gate.
    ReadUnlock,
    /// Tombstone every row of the sending source.
    MarkFailed,
    /// Drop every row of the sending source.
    Flush,
    /// Persist a source descriptor and its keyed options.
    SourceAdded { kind: String, options: BTreeMap<String, Value> },
    /// Drop a source descriptor.
    SourceRemoved,
    /// Store a snapshot set and mark its rows as in-flight.
    Snapshot { ctxid: String, rows: Vec<SnapshotRow>, done: SyncPoint },
    /// Discard a snapshot set and clear the in-flight marks.
    DropSnapshot { ctxid: String },
    /// A source-side failure the manager must re-raise.
    Abort(String),
    /// Orderly termination of the manager loop.
    Shutdown,
}

impl ControlEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ControlEvent::Sync(_) => "control:sync",
            ControlEvent::ReadLock => "control:read_lock",
            ControlEvent::ReadUnlock => "control:read_unlock",
            ControlEvent::MarkFailed => "control:mark_failed",
            ControlEvent::Flush => "control:flush",
            ControlEvent::SourceAdded { .. } => "control:source_added",
            ControlEvent::SourceRemoved => "control:source_removed",
            ControlEvent::Snapshot { .. } => "control:snapshot",
            ControlEvent::DropSnapshot { .. } => "control:drop_snapshot",
            ControlEvent::Abort(_) => "control:abort",
            ControlEvent::Shutdown => "control:shutdown",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
