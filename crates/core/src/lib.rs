// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain types for the network database: targets, per-family record
//! types and keys, the event and request unions carried between sources and
//! the database manager, and the rendezvous primitive used for queue
//! synchronization.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod address;
mod entity;
mod error;
mod event;
mod link;
mod neighbour;
mod request;
mod route;
mod rule;
mod snapshot;
mod sync;
mod target;

pub use address::{AddressKey, AddressRecord};
pub use entity::{as_mac, as_str, as_u16, as_u32, as_u8, parse_ip, Entity, EntityKind, Match};
pub use error::Error;
pub use event::{ControlEvent, EventBatch, RtnlEvent};
pub use link::{LinkChanges, LinkRecord, LinkState, IFF_UP};
pub use neighbour::{NeighbourKey, NeighbourRecord, NUD_PERMANENT};
pub use request::{DumpKind, RtnlRequest, DUMP_SEQUENCE};
pub use route::{NextHop, RouteKey, RouteRecord, RT_TABLE_MAIN};
pub use rule::{RuleKey, RuleRecord};
pub use snapshot::{DepRole, SnapshotRow};
pub use sync::SyncPoint;
pub use target::Target;

/// Generic attribute value, shared by staging, filters, and reports.
pub type Value = serde_json::Value;

/// Address family numbers used in record keys.
pub const AF_INET: u8 = 2;
/// IPv6 address family.
pub const AF_INET6: u8 = 10;
/// MPLS address family.
pub const AF_MPLS: u8 = 28;
