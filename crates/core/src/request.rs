// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutation requests and bulk dump kinds submitted through a source
//! channel.

use crate::address::AddressRecord;
use crate::link::{LinkChanges, LinkRecord};
use crate::neighbour::NeighbourRecord;
use crate::route::RouteRecord;
use crate::rule::RuleRecord;

/// A unicast RTNL request, acknowledged by the kernel.
#[derive(Debug, Clone)]
pub enum RtnlRequest {
    AddLink(LinkRecord),
    SetLink { index: u32, changes: LinkChanges },
    DelLink { index: u32 },
    AddAddress(AddressRecord),
    DelAddress(AddressRecord),
    AddRoute(RouteRecord),
    DelRoute(RouteRecord),
    AddNeighbour(NeighbourRecord),
    DelNeighbour(NeighbourRecord),
    AddRule(RuleRecord),
    DelRule(RuleRecord),
}

impl RtnlRequest {
    pub fn name(&self) -> &'static str {
        match self {
            RtnlRequest::AddLink(_) => "link:add",
            RtnlRequest::SetLink { .. } => "link:set",
            RtnlRequest::DelLink { .. } => "link:del",
            RtnlRequest::AddAddress(_) => "address:add",
            RtnlRequest::DelAddress(_) => "address:del",
            RtnlRequest::AddRoute(_) => "route:add",
            RtnlRequest::DelRoute(_) => "route:del",
            RtnlRequest::AddNeighbour(_) => "neighbour:add",
            RtnlRequest::DelNeighbour(_) => "neighbour:del",
            RtnlRequest::AddRule(_) => "rule:add",
            RtnlRequest::DelRule(_) => "rule:del",
        }
    }
}

/// One bulk dump family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Links,
    Addresses,
    Neighbours,
    RoutesV4,
    RoutesV6,
    RoutesMpls,
    RulesV4,
    RulesV6,
}

/// The dump families issued, in order, during a source's initial load.
pub const DUMP_SEQUENCE: &[DumpKind] = &[
    DumpKind::Links,
    DumpKind::Addresses,
    DumpKind::Neighbours,
    DumpKind::RoutesV4,
    DumpKind::RoutesV6,
    DumpKind::RoutesMpls,
    DumpKind::RulesV4,
    DumpKind::RulesV6,
];
