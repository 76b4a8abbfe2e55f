// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-process kernel double.
//!
//! `FakeKernel` models one kernel network stack: it allocates interface
//! indices, applies mutation requests with kernel-like error codes,
//! cascades dependent objects on link removal, answers bulk dumps, and
//! multicasts echo events to every bound channel. Tests drive the whole
//! database against it without privileges or a live netlink socket.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use netdb_core::{
    AddressKey, AddressRecord, DumpKind, Entity, EventBatch, LinkRecord, NeighbourKey,
    NeighbourRecord, RouteKey, RouteRecord, RtnlEvent, RtnlRequest, RuleKey, RuleRecord, AF_INET,
    AF_INET6,
};

use crate::{ChannelError, RtnlChannel, Transport, TransportOptions};

const ENOENT: i32 = 2;
const ESRCH: i32 = 3;
const EEXIST: i32 = 17;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;
const EOPNOTSUPP: i32 = 95;
const EADDRNOTAVAIL: i32 = 99;
const ENETUNREACH: i32 = 101;

/// Poll interval for the channel receive loop.
const RECV_TICK: Duration = Duration::from_millis(5);

struct Tap {
    tx: Sender<EventBatch>,
    broken: Arc<AtomicBool>,
}

#[derive(Default)]
struct KernelState {
    links: BTreeMap<u32, LinkRecord>,
    addresses: BTreeMap<AddressKey, AddressRecord>,
    routes: BTreeMap<RouteKey, RouteRecord>,
    neighbours: BTreeMap<NeighbourKey, NeighbourRecord>,
    rules: BTreeMap<RuleKey, RuleRecord>,
    next_index: u32,
    kinds: BTreeSet<String>,
    taps: Vec<Tap>,
}

impl KernelState {
    fn broadcast(&mut self, event: RtnlEvent) {
        self.taps.retain(|tap| tap.tx.send(vec![event.clone()]).is_ok());
    }

    fn alloc_index(&mut self) -> u32 {
        self.next_index += 1;
        self.next_index
    }

    fn apply(&mut self, request: &RtnlRequest) -> Result<(), ChannelError> {
        match request {
            RtnlRequest::AddLink(spec) => self.add_link(spec),
            RtnlRequest::SetLink { index, changes } => self.set_link(*index, changes),
            RtnlRequest::DelLink { index } => self.del_link(*index),
            RtnlRequest::AddAddress(spec) => self.add_address(spec),
            RtnlRequest::DelAddress(spec) => self.del_address(spec),
            RtnlRequest::AddRoute(spec) => self.add_route(spec),
            RtnlRequest::DelRoute(spec) => self.del_route(spec),
            RtnlRequest::AddNeighbour(spec) => self.add_neighbour(spec),
            RtnlRequest::DelNeighbour(spec) => self.del_neighbour(spec),
            RtnlRequest::AddRule(spec) => self.add_rule(spec),
            RtnlRequest::DelRule(spec) => self.del_rule(spec),
        }
    }

    fn add_link(&mut self, spec: &LinkRecord) -> Result<(), ChannelError> {
        let kind = spec
            .kind
            .as_deref()
            .ok_or_else(|| ChannelError::netlink(EINVAL, "link kind required"))?;
        if !self.kinds.contains(kind) {
            return Err(ChannelError::netlink(EOPNOTSUPP, "operation not supported"));
        }
        if spec.ifname.is_empty() {
            return Err(ChannelError::netlink(EINVAL, "ifname required"));
        }
        if self.links.values().any(|l| l.ifname == spec.ifname) {
            return Err(ChannelError::netlink(EEXIST, "file exists"));
        }
        if kind == "vlan" {
            let parent = spec.link.ok_or_else(|| {
                ChannelError::netlink(EINVAL, "vlan links need a parent")
            })?;
            if !self.links.contains_key(&parent) {
                return Err(ChannelError::netlink(ENODEV, "no such device"));
            }
            if spec.vlan_id.is_none() {
                return Err(ChannelError::netlink(EINVAL, "vlan links need a vlan_id"));
            }
        }
        let mut link = spec.clone();
        link.index = self.alloc_index();
        if link.address.is_none() {
            link.address = Some(default_mac(link.index));
        }
        if link.mtu.is_none() {
            link.mtu = Some(1500);
        }
        link.sync_state();
        self.links.insert(link.index, link.clone());
        self.broadcast(RtnlEvent::NewLink(link));
        Ok(())
    }

    fn set_link(&mut self, index: u32, changes: &netdb_core::LinkChanges) -> Result<(), ChannelError> {
        if let Some(master) = changes.master {
            if master != 0 && !self.links.contains_key(&master) {
                return Err(ChannelError::netlink(ENODEV, "no such master device"));
            }
        }
        let link = self
            .links
            .get_mut(&index)
            .ok_or_else(|| ChannelError::netlink(ENODEV, "no such device"))?;
        if let Some((value, mask)) = changes.flags {
            link.flags = (link.flags & !mask) | (value & mask);
            link.sync_state();
        }
        if let Some(master) = changes.master {
            link.master = if master == 0 { None } else { Some(master) };
        }
        if let Some(mtu) = changes.mtu {
            link.mtu = Some(mtu);
        }
        if let Some(mac) = &changes.address {
            link.address = Some(mac.clone());
        }
        let updated = link.clone();
        self.broadcast(RtnlEvent::NewLink(updated));
        Ok(())
    }

    fn del_link(&mut self, index: u32) -> Result<(), ChannelError> {
        let link = self
            .links
            .remove(&index)
            .ok_or_else(|| ChannelError::netlink(ENODEV, "no such device"))?;

        // The kernel releases enslaved ports, deletes stacked VLAN
        // children, and drops owned addresses, routes, and neighbours,
        // emitting an event for each.
        let ports: Vec<u32> = self
            .links
            .values()
            .filter(|l| l.master == Some(index))
            .map(|l| l.index)
            .collect();
        for port in ports {
            if let Some(l) = self.links.get_mut(&port) {
                l.master = None;
                let updated = l.clone();
                self.broadcast(RtnlEvent::NewLink(updated));
            }
        }
        let children: Vec<u32> = self
            .links
            .values()
            .filter(|l| l.link == Some(index))
            .map(|l| l.index)
            .collect();
        for child in children {
            let _ = self.del_link(child);
        }

        let addresses: Vec<AddressKey> =
            self.addresses.keys().filter(|k| k.index == index).copied().collect();
        for key in addresses {
            if let Some(addr) = self.addresses.remove(&key) {
                self.broadcast(RtnlEvent::DelAddress(addr));
            }
        }
        let routes: Vec<RouteKey> = self
            .routes
            .iter()
            .filter(|(_, r)| r.oif == Some(index))
            .map(|(k, _)| *k)
            .collect();
        for key in routes {
            if let Some(route) = self.routes.remove(&key) {
                self.broadcast(RtnlEvent::DelRoute(route));
            }
        }
        let neighbours: Vec<NeighbourKey> =
            self.neighbours.keys().filter(|k| k.ifindex == index).copied().collect();
        for key in neighbours {
            if let Some(neigh) = self.neighbours.remove(&key) {
                self.broadcast(RtnlEvent::DelNeighbour(neigh));
            }
        }

        self.broadcast(RtnlEvent::DelLink(link));
        Ok(())
    }

    fn add_address(&mut self, spec: &AddressRecord) -> Result<(), ChannelError> {
        if !self.links.contains_key(&spec.index) {
            return Err(ChannelError::netlink(ENODEV, "no such device"));
        }
        let mut addr = spec.clone();
        addr.sync_family();
        if self.addresses.contains_key(&addr.key()) {
            return Err(ChannelError::netlink(EEXIST, "file exists"));
        }
        self.addresses.insert(addr.key(), addr.clone());
        self.broadcast(RtnlEvent::NewAddress(addr));
        Ok(())
    }

    fn del_address(&mut self, spec: &AddressRecord) -> Result<(), ChannelError> {
        let addr = self
            .addresses
            .remove(&spec.key())
            .ok_or_else(|| ChannelError::netlink(EADDRNOTAVAIL, "address not found"))?;
        self.broadcast(RtnlEvent::DelAddress(addr));
        Ok(())
    }

    fn add_route(&mut self, spec: &RouteRecord) -> Result<(), ChannelError> {
        let mut route = spec.clone();
        route.sync_family();
        if self.routes.contains_key(&route.key()) {
            return Err(ChannelError::netlink(EEXIST, "file exists"));
        }
        if let Some(gateway) = route.gateway {
            // A gateway must be reachable through a configured subnet.
            let via = self
                .addresses
                .values()
                .find(|a| same_subnet(gateway, a.address, a.prefixlen))
                .map(|a| a.index);
            match via {
                Some(index) => {
                    if route.oif.is_none() {
                        route.oif = Some(index);
                    }
                }
                None => return Err(ChannelError::netlink(ENETUNREACH, "network is unreachable")),
            }
        } else if let Some(oif) = route.oif {
            if !self.links.contains_key(&oif) {
                return Err(ChannelError::netlink(ENODEV, "no such device"));
            }
        } else if route.multipath.is_empty() {
            return Err(ChannelError::netlink(EINVAL, "route needs a gateway or device"));
        }
        self.routes.insert(route.key(), route.clone());
        self.broadcast(RtnlEvent::NewRoute(route));
        Ok(())
    }

    fn del_route(&mut self, spec: &RouteRecord) -> Result<(), ChannelError> {
        let route = self
            .routes
            .remove(&spec.key())
            .ok_or_else(|| ChannelError::netlink(ESRCH, "no such route"))?;
        self.broadcast(RtnlEvent::DelRoute(route));
        Ok(())
    }

    fn add_neighbour(&mut self, spec: &NeighbourRecord) -> Result<(), ChannelError> {
        if !self.links.contains_key(&spec.ifindex) {
            return Err(ChannelError::netlink(ENODEV, "no such device"));
        }
        let mut neigh = spec.clone();
        neigh.sync_family();
        if self.neighbours.contains_key(&neigh.key()) {
            return Err(ChannelError::netlink(EEXIST, "file exists"));
        }
        self.neighbours.insert(neigh.key(), neigh.clone());
        self.broadcast(RtnlEvent::NewNeighbour(neigh));
        Ok(())
    }

    fn del_neighbour(&mut self, spec: &NeighbourRecord) -> Result<(), ChannelError> {
        let neigh = self
            .neighbours
            .remove(&spec.key())
            .ok_or_else(|| ChannelError::netlink(ESRCH, "no such neighbour"))?;
        self.broadcast(RtnlEvent::DelNeighbour(neigh));
        Ok(())
    }

    fn add_rule(&mut self, spec: &RuleRecord) -> Result<(), ChannelError> {
        if self.rules.contains_key(&spec.key()) {
            return Err(ChannelError::netlink(EEXIST, "file exists"));
        }
        self.rules.insert(spec.key(), spec.clone());
        self.broadcast(RtnlEvent::NewRule(spec.clone()));
        Ok(())
    }

    fn del_rule(&mut self, spec: &RuleRecord) -> Result<(), ChannelError> {
        let rule = self
            .rules
            .remove(&spec.key())
            .ok_or_else(|| ChannelError::netlink(ENOENT, "no such rule"))?;
        self.broadcast(RtnlEvent::DelRule(rule));
        Ok(())
    }

    fn dump(&self, kind: DumpKind) -> EventBatch {
        match kind {
            DumpKind::Links => self.links.values().cloned().map(RtnlEvent::NewLink).collect(),
            DumpKind::Addresses => {
                self.addresses.values().cloned().map(RtnlEvent::NewAddress).collect()
            }
            DumpKind::Neighbours => {
                self.neighbours.values().cloned().map(RtnlEvent::NewNeighbour).collect()
            }
            DumpKind::RoutesV4 => self.dump_routes(AF_INET),
            DumpKind::RoutesV6 => self.dump_routes(AF_INET6),
            DumpKind::RoutesMpls => Vec::new(),
            DumpKind::RulesV4 => self.dump_rules(AF_INET),
            DumpKind::RulesV6 => self.dump_rules(AF_INET6),
        }
    }

    fn dump_routes(&self, family: u8) -> EventBatch {
        self.routes
            .values()
            .filter(|r| r.family == family)
            .cloned()
            .map(RtnlEvent::NewRoute)
            .collect()
    }

    fn dump_rules(&self, family: u8) -> EventBatch {
        self.rules
            .values()
            .filter(|r| r.family == family)
            .cloned()
            .map(RtnlEvent::NewRule)
            .collect()
    }
}

/// One modelled kernel network stack, shared by every channel its
/// transport hands out.
#[derive(Clone)]
pub struct FakeKernel {
    state: Arc<Mutex<KernelState>>,
}

impl Default for FakeKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeKernel {
    pub fn new() -> Self {
        let mut state = KernelState::default();
        for kind in ["dummy", "bridge", "vlan", "veth", "vxlan", "vrf", "bond"] {
            state.kinds.insert(kind.to_string());
        }
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// The transport handing out channels bound to this kernel.
    pub fn transport(&self) -> FakeTransport {
        FakeTransport { state: Arc::clone(&self.state) }
    }

    /// Apply a request directly, as if issued by some other process.
    pub fn apply(&self, request: &RtnlRequest) -> Result<(), ChannelError> {
        self.state.lock().apply(request)
    }

    /// Break every live connection: their reads start failing with an
    /// i/o error until the channel is reconnected.
    pub fn fail_connections(&self) {
        let mut state = self.state.lock();
        for tap in state.taps.drain(..) {
            tap.broken.store(true, Ordering::SeqCst);
        }
    }

    // -- inspection helpers for tests --------------------------------------

    pub fn link(&self, ifname: &str) -> Option<LinkRecord> {
        self.state.lock().links.values().find(|l| l.ifname == ifname).cloned()
    }

    pub fn has_link(&self, ifname: &str) -> bool {
        self.link(ifname).is_some()
    }

    pub fn link_count(&self) -> usize {
        self.state.lock().links.len()
    }

    pub fn addresses_of(&self, ifname: &str) -> Vec<AddressRecord> {
        let state = self.state.lock();
        match state.links.values().find(|l| l.ifname == ifname) {
            Some(link) => {
                state.addresses.values().filter(|a| a.index == link.index).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn has_address(&self, ifname: &str, address: &str, prefixlen: u8) -> bool {
        self.addresses_of(ifname)
            .iter()
            .any(|a| a.address.to_string() == address && a.prefixlen == prefixlen)
    }

    pub fn has_route(&self, dst: &str, dst_len: u8) -> bool {
        let state = self.state.lock();
        state
            .routes
            .values()
            .any(|r| r.dst.map(|ip| ip.to_string()).as_deref() == Some(dst) && r.dst_len == dst_len)
    }

    pub fn route_count(&self) -> usize {
        self.state.lock().routes.len()
    }

    pub fn neighbour_count(&self) -> usize {
        self.state.lock().neighbours.len()
    }
}

/// Transport handing out [`FakeChannel`]s for one [`FakeKernel`].
#[derive(Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<KernelState>>,
}

impl Transport for FakeTransport {
    fn connect(&self, _options: &TransportOptions) -> Result<Arc<dyn RtnlChannel>, ChannelError> {
        let (tx, rx) = unbounded();
        Ok(Arc::new(FakeChannel {
            state: Arc::clone(&self.state),
            tx,
            rx,
            closed: AtomicBool::new(false),
            broken: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// One bound connection to a [`FakeKernel`].
pub struct FakeChannel {
    state: Arc<Mutex<KernelState>>,
    tx: Sender<EventBatch>,
    rx: Receiver<EventBatch>,
    closed: AtomicBool,
    broken: Arc<AtomicBool>,
}

impl FakeChannel {
    fn ensure_usable(&self) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(ChannelError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection dropped",
            )));
        }
        Ok(())
    }
}

impl RtnlChannel for FakeChannel {
    fn bind(&self) -> Result<(), ChannelError> {
        self.ensure_usable()?;
        self.state.lock().taps.push(Tap {
            tx: self.tx.clone(),
            broken: Arc::clone(&self.broken),
        });
        Ok(())
    }

    fn dump(&self, kind: DumpKind) -> Result<EventBatch, ChannelError> {
        self.ensure_usable()?;
        Ok(self.state.lock().dump(kind))
    }

    fn submit(&self, request: &RtnlRequest) -> Result<(), ChannelError> {
        self.ensure_usable()?;
        self.state.lock().apply(request)
    }

    fn recv(&self) -> Result<EventBatch, ChannelError> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(ChannelError::Closed);
            }
            self.ensure_usable()?;
            match self.rx.recv_timeout(RECV_TICK) {
                Ok(batch) => return Ok(batch),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Err(ChannelError::Closed)
                }
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn default_mac(index: u32) -> String {
    let bytes = index.to_be_bytes();
    format!("0a:00:{:02x}:{:02x}:{:02x}:{:02x}", bytes[0], bytes[1], bytes[2], bytes[3])
}

fn same_subnet(ip: IpAddr, net: IpAddr, prefixlen: u8) -> bool {
    match (ip, net) {
        (IpAddr::V4(a), IpAddr::V4(b)) => {
            if prefixlen == 0 {
                return true;
            }
            if prefixlen > 32 {
                return false;
            }
            let shift = 32 - u32::from(prefixlen);
            (u32::from(a) >> shift) == (u32::from(b) >> shift)
        }
        (IpAddr::V6(a), IpAddr::V6(b)) => {
            if prefixlen == 0 {
                return true;
            }
            if prefixlen > 128 {
                return false;
            }
            let shift = 128 - u32::from(prefixlen);
            (u128::from(a) >> shift) == (u128::from(b) >> shift)
        }
        _ => false,
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
