// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversion between wire messages and record types, both directions.
//!
//! Everything netlink-shaped stays inside this module; the rest of the
//! workspace only sees records, events, and requests.

use std::net::IpAddr;

use netlink_packet_core::{
    NetlinkMessage, NetlinkPayload, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL,
    NLM_F_REQUEST,
};
use netlink_packet_route::link::nlas::{
    Info, InfoBridge, InfoData, InfoKind, InfoVlan, InfoVrf, InfoVxlan,
};
use netlink_packet_route::{
    address, link, neighbour, route, rule, AddressMessage, LinkMessage, NeighbourMessage,
    RouteMessage, RtnlMessage, RuleMessage,
};
use tracing::debug;

use netdb_core::{
    AddressRecord, DumpKind, LinkChanges, LinkRecord, NeighbourRecord, NextHop, RouteRecord,
    RtnlEvent, RtnlRequest, RuleRecord, AF_INET, AF_INET6, AF_MPLS, NUD_PERMANENT,
};

use crate::ChannelError;

const RTPROT_STATIC: u8 = 4;
const RTN_UNICAST: u8 = 1;
const RT_TABLE_COMPAT: u32 = 252;

/// Request flags for a bulk dump.
pub(crate) const DUMP_FLAGS: u16 = NLM_F_REQUEST | NLM_F_DUMP;

/// One decoded reply from the wire.
#[derive(Debug)]
pub(crate) enum Reply {
    Event(RtnlEvent),
    Ack,
    /// Positive errno from an NLMSG_ERROR payload.
    Error(i32),
    Done,
    Ignored,
}

/// Decode a receive buffer that may hold several netlink messages.
pub(crate) fn parse_replies(buffer: &[u8]) -> Result<Vec<Reply>, ChannelError> {
    let mut replies = Vec::new();
    let mut offset = 0;
    while offset < buffer.len() {
        let msg = NetlinkMessage::<RtnlMessage>::deserialize(&buffer[offset..])
            .map_err(|e| ChannelError::Decode(e.to_string()))?;
        let length = msg.header.length as usize;
        replies.push(match msg.payload {
            NetlinkPayload::InnerMessage(inner) => rtnl_to_reply(inner),
            NetlinkPayload::Error(err) => {
                if err.code == 0 {
                    Reply::Ack
                } else {
                    Reply::Error(-err.code)
                }
            }
            NetlinkPayload::Ack(_) => Reply::Ack,
            NetlinkPayload::Done => Reply::Done,
            _ => Reply::Ignored,
        });
        if length == 0 {
            break;
        }
        offset += length;
    }
    Ok(replies)
}

fn rtnl_to_reply(msg: RtnlMessage) -> Reply {
    match msg {
        RtnlMessage::NewLink(m) | RtnlMessage::SetLink(m) => {
            Reply::Event(RtnlEvent::NewLink(link_from_msg(&m)))
        }
        RtnlMessage::DelLink(m) => Reply::Event(RtnlEvent::DelLink(link_from_msg(&m))),
        RtnlMessage::NewAddress(m) => match address_from_msg(&m) {
            Some(rec) => Reply::Event(RtnlEvent::NewAddress(rec)),
            None => Reply::Ignored,
        },
        RtnlMessage::DelAddress(m) => match address_from_msg(&m) {
            Some(rec) => Reply::Event(RtnlEvent::DelAddress(rec)),
            None => Reply::Ignored,
        },
        RtnlMessage::NewRoute(m) => Reply::Event(RtnlEvent::NewRoute(route_from_msg(&m))),
        RtnlMessage::DelRoute(m) => Reply::Event(RtnlEvent::DelRoute(route_from_msg(&m))),
        RtnlMessage::NewNeighbour(m) => match neighbour_from_msg(&m) {
            Some(rec) => Reply::Event(RtnlEvent::NewNeighbour(rec)),
            None => Reply::Ignored,
        },
        RtnlMessage::DelNeighbour(m) => match neighbour_from_msg(&m) {
            Some(rec) => Reply::Event(RtnlEvent::DelNeighbour(rec)),
            None => Reply::Ignored,
        },
        RtnlMessage::NewRule(m) => Reply::Event(RtnlEvent::NewRule(rule_from_msg(&m))),
        RtnlMessage::DelRule(m) => Reply::Event(RtnlEvent::DelRule(rule_from_msg(&m))),
        _ => {
            debug!("ignoring rtnl message of an unhandled family");
            Reply::Ignored
        }
    }
}

// -- wire → record ----------------------------------------------------------

pub(crate) fn link_from_msg(msg: &LinkMessage) -> LinkRecord {
    let mut rec = LinkRecord {
        index: msg.header.index,
        flags: msg.header.flags,
        ..LinkRecord::default()
    };
    for nla in &msg.nlas {
        match nla {
            link::nlas::Nla::IfName(name) => rec.ifname = name.clone(),
            link::nlas::Nla::Address(bytes) => rec.address = Some(format_mac(bytes)),
            link::nlas::Nla::Master(master) => rec.master = Some(*master),
            link::nlas::Nla::Link(parent) => rec.link = Some(*parent),
            link::nlas::Nla::Mtu(mtu) => rec.mtu = Some(*mtu),
            link::nlas::Nla::Info(infos) => apply_link_info(&mut rec, infos),
            _ => {}
        }
    }
    rec.sync_state();
    rec
}

fn apply_link_info(rec: &mut LinkRecord, infos: &[Info]) {
    for info in infos {
        match info {
            Info::Kind(kind) => rec.kind = Some(kind_name(kind)),
            Info::Data(InfoData::Vlan(vlans)) => {
                for vlan in vlans {
                    match vlan {
                        InfoVlan::Id(id) => rec.vlan_id = Some(*id),
                        InfoVlan::Protocol(proto) => rec.vlan_protocol = Some(*proto),
                        _ => {}
                    }
                }
            }
            Info::Data(InfoData::Bridge(bridges)) => {
                for bridge in bridges {
                    match bridge {
                        InfoBridge::StpState(state) => rec.br_stp_state = Some(*state),
                        InfoBridge::VlanFiltering(filtering) => {
                            rec.br_vlan_filtering = Some(*filtering)
                        }
                        _ => {}
                    }
                }
            }
            Info::Data(InfoData::Vxlan(vxlans)) => {
                for vxlan in vxlans {
                    match vxlan {
                        InfoVxlan::Id(id) => rec.vxlan_id = Some(*id),
                        InfoVxlan::Link(parent) => rec.vxlan_link = Some(*parent),
                        InfoVxlan::Port(port) => rec.vxlan_port = Some(*port),
                        _ => {}
                    }
                }
            }
            Info::Data(InfoData::Vrf(vrfs)) => {
                for vrf in vrfs {
                    if let InfoVrf::TableId(table) = vrf {
                        rec.vrf_table = Some(*table);
                    }
                }
            }
            _ => {}
        }
    }
}

fn kind_name(kind: &InfoKind) -> String {
    match kind {
        InfoKind::Dummy => "dummy".to_string(),
        InfoKind::Bridge => "bridge".to_string(),
        InfoKind::Vlan => "vlan".to_string(),
        InfoKind::Veth => "veth".to_string(),
        InfoKind::Vxlan => "vxlan".to_string(),
        InfoKind::Vrf => "vrf".to_string(),
        InfoKind::Bond => "bond".to_string(),
        InfoKind::Other(name) => name.clone(),
        other => format!("{:?}", other).to_ascii_lowercase(),
    }
}

pub(crate) fn address_from_msg(msg: &AddressMessage) -> Option<AddressRecord> {
    let mut address = None;
    let mut local = None;
    let mut label = None;
    for nla in &msg.nlas {
        match nla {
            address::nlas::Nla::Address(bytes) => address = ip_from_bytes(bytes),
            address::nlas::Nla::Local(bytes) => local = ip_from_bytes(bytes),
            address::nlas::Nla::Label(name) => label = Some(name.clone()),
            _ => {}
        }
    }
    // IFA_LOCAL is authoritative for IPv4; IFA_ADDRESS is the peer.
    let ip = local.or(address)?;
    let mut rec = AddressRecord::new(msg.header.index, ip, msg.header.prefix_len);
    rec.family = msg.header.family;
    rec.scope = msg.header.scope;
    rec.label = label;
    Some(rec)
}

pub(crate) fn route_from_msg(msg: &RouteMessage) -> RouteRecord {
    let mut rec = RouteRecord {
        family: msg.header.address_family,
        dst: None,
        dst_len: msg.header.destination_prefix_length,
        table: u32::from(msg.header.table),
        priority: 0,
        tos: msg.header.tos,
        protocol: msg.header.protocol,
        scope: msg.header.scope,
        route_type: msg.header.kind,
        oif: None,
        gateway: None,
        multipath: Vec::new(),
    };
    for nla in &msg.nlas {
        match nla {
            route::nlas::Nla::Destination(bytes) => rec.dst = ip_from_bytes(bytes),
            route::nlas::Nla::Gateway(bytes) => rec.gateway = ip_from_bytes(bytes),
            route::nlas::Nla::Oif(oif) => rec.oif = Some(*oif),
            route::nlas::Nla::Priority(priority) => rec.priority = *priority,
            route::nlas::Nla::Table(table) => rec.table = *table,
            // RTA_MULTIPATH carries nested next hops the pinned codec
            // generation does not expose typed; see DESIGN.md.
            _ => {}
        }
    }
    rec
}

pub(crate) fn neighbour_from_msg(msg: &NeighbourMessage) -> Option<NeighbourRecord> {
    let mut dst = None;
    let mut lladdr = None;
    for nla in &msg.nlas {
        match nla {
            neighbour::nlas::Nla::Destination(bytes) => dst = ip_from_bytes(bytes),
            neighbour::nlas::Nla::LinkLocalAddress(bytes) => lladdr = Some(format_mac(bytes)),
            _ => {}
        }
    }
    Some(NeighbourRecord {
        ifindex: msg.header.ifindex,
        dst: dst?,
        family: msg.header.family,
        lladdr,
        nud_state: msg.header.state,
    })
}

pub(crate) fn rule_from_msg(msg: &RuleMessage) -> RuleRecord {
    let mut rec = RuleRecord {
        family: msg.header.family,
        priority: 0,
        table: u32::from(msg.header.table),
        src: None,
        src_len: msg.header.src_len,
        dst: None,
        dst_len: msg.header.dst_len,
        tos: msg.header.tos,
        action: msg.header.action,
        fwmark: None,
    };
    for nla in &msg.nlas {
        match nla {
            rule::nlas::Nla::Priority(priority) => rec.priority = *priority,
            rule::nlas::Nla::Table(table) => rec.table = *table,
            rule::nlas::Nla::Source(bytes) => rec.src = ip_from_bytes(bytes),
            rule::nlas::Nla::Destination(bytes) => rec.dst = ip_from_bytes(bytes),
            rule::nlas::Nla::FwMark(mark) => rec.fwmark = Some(*mark),
            _ => {}
        }
    }
    rec
}

// -- record → wire ----------------------------------------------------------

/// Build the inner message and header flags for one mutation request.
pub(crate) fn request_parts(req: &RtnlRequest) -> Result<(RtnlMessage, u16), ChannelError> {
    let ack = NLM_F_REQUEST | NLM_F_ACK;
    let create = ack | NLM_F_CREATE | NLM_F_EXCL;
    Ok(match req {
        RtnlRequest::AddLink(spec) => (RtnlMessage::NewLink(link_to_msg(spec)?), create),
        RtnlRequest::SetLink { index, changes } => {
            (RtnlMessage::SetLink(changes_to_msg(*index, changes)?), ack)
        }
        RtnlRequest::DelLink { index } => {
            let mut msg = LinkMessage::default();
            msg.header.index = *index;
            (RtnlMessage::DelLink(msg), ack)
        }
        RtnlRequest::AddAddress(spec) => (RtnlMessage::NewAddress(address_to_msg(spec)), create),
        RtnlRequest::DelAddress(spec) => (RtnlMessage::DelAddress(address_to_msg(spec)), ack),
        RtnlRequest::AddRoute(spec) => (RtnlMessage::NewRoute(route_to_msg(spec)?), create),
        RtnlRequest::DelRoute(spec) => (RtnlMessage::DelRoute(route_to_msg(spec)?), ack),
        RtnlRequest::AddNeighbour(spec) => {
            (RtnlMessage::NewNeighbour(neighbour_to_msg(spec)?), create)
        }
        RtnlRequest::DelNeighbour(spec) => {
            (RtnlMessage::DelNeighbour(neighbour_to_msg(spec)?), ack)
        }
        RtnlRequest::AddRule(spec) => (RtnlMessage::NewRule(rule_to_msg(spec)), create),
        RtnlRequest::DelRule(spec) => (RtnlMessage::DelRule(rule_to_msg(spec)), ack),
    })
}

/// Build the dump request message for one family.
pub(crate) fn dump_request(kind: DumpKind) -> RtnlMessage {
    match kind {
        DumpKind::Links => RtnlMessage::GetLink(LinkMessage::default()),
        DumpKind::Addresses => RtnlMessage::GetAddress(AddressMessage::default()),
        DumpKind::Neighbours => RtnlMessage::GetNeighbour(NeighbourMessage::default()),
        DumpKind::RoutesV4 => RtnlMessage::GetRoute(route_dump_msg(AF_INET)),
        DumpKind::RoutesV6 => RtnlMessage::GetRoute(route_dump_msg(AF_INET6)),
        DumpKind::RoutesMpls => RtnlMessage::GetRoute(route_dump_msg(AF_MPLS)),
        DumpKind::RulesV4 => RtnlMessage::GetRule(rule_dump_msg(AF_INET)),
        DumpKind::RulesV6 => RtnlMessage::GetRule(rule_dump_msg(AF_INET6)),
    }
}

fn route_dump_msg(family: u8) -> RouteMessage {
    let mut msg = RouteMessage::default();
    msg.header.address_family = family;
    msg
}

fn rule_dump_msg(family: u8) -> RuleMessage {
    let mut msg = RuleMessage::default();
    msg.header.family = family;
    msg
}

/// Frame, finalize, and serialize one message.
pub(crate) fn seal(payload: RtnlMessage, flags: u16, seq: u32) -> Vec<u8> {
    let mut msg = NetlinkMessage::from(payload);
    msg.header.flags = flags;
    msg.header.sequence_number = seq;
    msg.finalize();
    let mut buf = vec![0u8; msg.buffer_len()];
    msg.serialize(&mut buf);
    buf
}

fn link_to_msg(spec: &LinkRecord) -> Result<LinkMessage, ChannelError> {
    let mut msg = LinkMessage::default();
    msg.header.index = spec.index;
    msg.header.flags = spec.flags;
    msg.header.change_mask = spec.flags;
    if !spec.ifname.is_empty() {
        msg.nlas.push(link::nlas::Nla::IfName(spec.ifname.clone()));
    }
    if let Some(mac) = &spec.address {
        msg.nlas.push(link::nlas::Nla::Address(parse_mac(mac)?));
    }
    if let Some(mtu) = spec.mtu {
        msg.nlas.push(link::nlas::Nla::Mtu(mtu));
    }
    if let Some(master) = spec.master {
        msg.nlas.push(link::nlas::Nla::Master(master));
    }
    if let Some(parent) = spec.link {
        msg.nlas.push(link::nlas::Nla::Link(parent));
    }
    if let Some(kind) = &spec.kind {
        let mut info = vec![Info::Kind(kind_from_name(kind))];
        if let Some(data) = info_data(kind, spec) {
            info.push(Info::Data(data));
        }
        msg.nlas.push(link::nlas::Nla::Info(info));
    }
    Ok(msg)
}

fn changes_to_msg(index: u32, changes: &LinkChanges) -> Result<LinkMessage, ChannelError> {
    let mut msg = LinkMessage::default();
    msg.header.index = index;
    if let Some((value, mask)) = changes.flags {
        msg.header.flags = value;
        msg.header.change_mask = mask;
    }
    if let Some(master) = changes.master {
        msg.nlas.push(link::nlas::Nla::Master(master));
    }
    if let Some(mtu) = changes.mtu {
        msg.nlas.push(link::nlas::Nla::Mtu(mtu));
    }
    if let Some(mac) = &changes.address {
        msg.nlas.push(link::nlas::Nla::Address(parse_mac(mac)?));
    }
    Ok(msg)
}

fn kind_from_name(kind: &str) -> InfoKind {
    match kind {
        "dummy" => InfoKind::Dummy,
        "bridge" => InfoKind::Bridge,
        "vlan" => InfoKind::Vlan,
        "veth" => InfoKind::Veth,
        "vxlan" => InfoKind::Vxlan,
        "vrf" => InfoKind::Vrf,
        "bond" => InfoKind::Bond,
        other => InfoKind::Other(other.to_string()),
    }
}

fn info_data(kind: &str, spec: &LinkRecord) -> Option<InfoData> {
    match kind {
        "vlan" => {
            let mut vlans = vec![InfoVlan::Id(spec.vlan_id?)];
            if let Some(proto) = spec.vlan_protocol {
                vlans.push(InfoVlan::Protocol(proto));
            }
            Some(InfoData::Vlan(vlans))
        }
        "bridge" => {
            let mut bridges = Vec::new();
            if let Some(state) = spec.br_stp_state {
                bridges.push(InfoBridge::StpState(state));
            }
            if let Some(filtering) = spec.br_vlan_filtering {
                bridges.push(InfoBridge::VlanFiltering(filtering));
            }
            if bridges.is_empty() {
                None
            } else {
                Some(InfoData::Bridge(bridges))
            }
        }
        "vxlan" => {
            let mut vxlans = vec![InfoVxlan::Id(spec.vxlan_id?)];
            if let Some(parent) = spec.vxlan_link {
                vxlans.push(InfoVxlan::Link(parent));
            }
            if let Some(port) = spec.vxlan_port {
                vxlans.push(InfoVxlan::Port(port));
            }
            Some(InfoData::Vxlan(vxlans))
        }
        "vrf" => Some(InfoData::Vrf(vec![InfoVrf::TableId(spec.vrf_table?)])),
        _ => None,
    }
}

fn address_to_msg(spec: &AddressRecord) -> AddressMessage {
    let mut msg = AddressMessage::default();
    msg.header.family = spec.family;
    msg.header.prefix_len = spec.prefixlen;
    msg.header.index = spec.index;
    msg.header.scope = spec.scope;
    let bytes = ip_to_bytes(spec.address);
    msg.nlas.push(address::nlas::Nla::Address(bytes.clone()));
    if spec.address.is_ipv4() {
        msg.nlas.push(address::nlas::Nla::Local(bytes));
    }
    msg
}

fn route_to_msg(spec: &RouteRecord) -> Result<RouteMessage, ChannelError> {
    if !spec.multipath.is_empty() {
        // No typed RTA_MULTIPATH encoding in this codec generation.
        return Err(ChannelError::Unsupported("multipath route encoding".to_string()));
    }
    let mut msg = RouteMessage::default();
    msg.header.address_family = spec.family;
    msg.header.destination_prefix_length = spec.dst_len;
    msg.header.tos = spec.tos;
    msg.header.protocol = if spec.protocol == 0 { RTPROT_STATIC } else { spec.protocol };
    msg.header.scope = spec.scope;
    msg.header.kind = if spec.route_type == 0 { RTN_UNICAST } else { spec.route_type };
    if spec.table < RT_TABLE_COMPAT {
        msg.header.table = spec.table as u8;
    } else {
        msg.nlas.push(route::nlas::Nla::Table(spec.table));
    }
    if let Some(dst) = spec.dst {
        msg.nlas.push(route::nlas::Nla::Destination(ip_to_bytes(dst)));
    }
    if let Some(gateway) = spec.gateway {
        msg.nlas.push(route::nlas::Nla::Gateway(ip_to_bytes(gateway)));
    }
    if let Some(oif) = spec.oif {
        msg.nlas.push(route::nlas::Nla::Oif(oif));
    }
    if spec.priority != 0 {
        msg.nlas.push(route::nlas::Nla::Priority(spec.priority));
    }
    Ok(msg)
}

fn neighbour_to_msg(spec: &NeighbourRecord) -> Result<NeighbourMessage, ChannelError> {
    let mut msg = NeighbourMessage::default();
    msg.header.family = spec.family;
    msg.header.ifindex = spec.ifindex;
    msg.header.state = if spec.nud_state == 0 { NUD_PERMANENT } else { spec.nud_state };
    msg.nlas.push(neighbour::nlas::Nla::Destination(ip_to_bytes(spec.dst)));
    if let Some(mac) = &spec.lladdr {
        msg.nlas.push(neighbour::nlas::Nla::LinkLocalAddress(parse_mac(mac)?));
    }
    Ok(msg)
}

fn rule_to_msg(spec: &RuleRecord) -> RuleMessage {
    let mut msg = RuleMessage::default();
    msg.header.family = spec.family;
    msg.header.dst_len = spec.dst_len;
    msg.header.src_len = spec.src_len;
    msg.header.tos = spec.tos;
    msg.header.action = spec.action;
    if spec.table < RT_TABLE_COMPAT {
        msg.header.table = spec.table as u8;
    } else {
        msg.nlas.push(rule::nlas::Nla::Table(spec.table));
    }
    msg.nlas.push(rule::nlas::Nla::Priority(spec.priority));
    if let Some(src) = spec.src {
        msg.nlas.push(rule::nlas::Nla::Source(ip_to_bytes(src)));
    }
    if let Some(dst) = spec.dst {
        msg.nlas.push(rule::nlas::Nla::Destination(ip_to_bytes(dst)));
    }
    if let Some(mark) = spec.fwmark {
        msg.nlas.push(rule::nlas::Nla::FwMark(mark));
    }
    msg
}

// -- byte-level helpers -----------------------------------------------------

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let mut octets = [0u8; 4];
            octets.copy_from_slice(bytes);
            Some(IpAddr::from(octets))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Some(IpAddr::from(octets))
        }
        _ => None,
    }
}

fn ip_to_bytes(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

fn format_mac(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":")
}

fn parse_mac(mac: &str) -> Result<Vec<u8>, ChannelError> {
    mac.split(':')
        .map(|octet| u8::from_str_radix(octet, 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| ChannelError::Decode(format!("bad link-layer address: {mac}")))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
