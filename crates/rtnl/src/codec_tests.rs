// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;

#[test]
fn link_round_trips_through_the_wire_shape() {
    let mut spec = LinkRecord::default();
    spec.ifname = "dummy0".to_string();
    spec.kind = Some("dummy".to_string());
    spec.flags = netdb_core::IFF_UP;
    spec.mtu = Some(1500);
    spec.address = Some("0a:00:00:00:00:01".to_string());

    let msg = link_to_msg(&spec).unwrap();
    let back = link_from_msg(&msg);

    assert_eq!(back.ifname, "dummy0");
    assert_eq!(back.kind.as_deref(), Some("dummy"));
    assert_eq!(back.mtu, Some(1500));
    assert_eq!(back.address.as_deref(), Some("0a:00:00:00:00:01"));
    assert_eq!(back.state, netdb_core::LinkState::Up);
}

#[test]
fn vlan_info_carries_id_and_parent() {
    let mut spec = LinkRecord::default();
    spec.ifname = "v100".to_string();
    spec.kind = Some("vlan".to_string());
    spec.vlan_id = Some(100);
    spec.link = Some(4);

    let back = link_from_msg(&link_to_msg(&spec).unwrap());
    assert_eq!(back.vlan_id, Some(100));
    assert_eq!(back.link, Some(4));
    assert_eq!(back.kind.as_deref(), Some("vlan"));
}

#[test]
fn unknown_kind_is_preserved_verbatim() {
    let mut spec = LinkRecord::default();
    spec.ifname = "x".to_string();
    spec.kind = Some("nosuchkind".to_string());
    let back = link_from_msg(&link_to_msg(&spec).unwrap());
    assert_eq!(back.kind.as_deref(), Some("nosuchkind"));
}

#[parameterized(
    v4 = { "10.0.0.2", 24 },
    v6 = { "fd00::2", 64 },
)]
fn address_round_trips(ip: &str, prefixlen: u8) {
    let spec = AddressRecord::new(3, ip.parse().unwrap(), prefixlen);
    let back = address_from_msg(&address_to_msg(&spec)).unwrap();
    assert_eq!(back.index, 3);
    assert_eq!(back.address, spec.address);
    assert_eq!(back.prefixlen, prefixlen);
    assert_eq!(back.family, spec.family);
}

#[test]
fn route_round_trips_with_gateway() {
    let mut spec = RouteRecord::default();
    spec.dst = Some("10.0.1.0".parse().unwrap());
    spec.dst_len = 24;
    spec.gateway = Some("10.0.0.1".parse().unwrap());
    spec.oif = Some(2);
    spec.priority = 100;

    let back = route_from_msg(&route_to_msg(&spec).unwrap());
    assert_eq!(back.dst, spec.dst);
    assert_eq!(back.dst_len, 24);
    assert_eq!(back.gateway, spec.gateway);
    assert_eq!(back.oif, Some(2));
    assert_eq!(back.priority, 100);
    assert_eq!(back.table, netdb_core::RT_TABLE_MAIN);
}

#[test]
fn multipath_encoding_is_refused() {
    let mut spec = RouteRecord::default();
    spec.multipath = vec![NextHop { oif: 2, gateway: None, hops: 1 }];
    assert!(matches!(route_to_msg(&spec), Err(ChannelError::Unsupported(_))));
}

#[test]
fn neighbour_defaults_to_permanent_state() {
    let mut spec = NeighbourRecord::default();
    spec.ifindex = 2;
    spec.dst = "10.0.0.99".parse().unwrap();
    spec.lladdr = Some("0a:00:00:00:00:63".to_string());

    let back = neighbour_from_msg(&neighbour_to_msg(&spec).unwrap()).unwrap();
    assert_eq!(back.nud_state, NUD_PERMANENT);
    assert_eq!(back.lladdr, spec.lladdr);
}

#[test]
fn sealed_request_parses_back() {
    let mut spec = LinkRecord::default();
    spec.ifname = "dummy0".to_string();
    spec.kind = Some("dummy".to_string());
    let (msg, flags) = request_parts(&RtnlRequest::AddLink(spec)).unwrap();
    let bytes = seal(msg, flags, 7);

    let replies = parse_replies(&bytes).unwrap();
    assert_eq!(replies.len(), 1);
    match &replies[0] {
        Reply::Event(RtnlEvent::NewLink(link)) => assert_eq!(link.ifname, "dummy0"),
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn mac_helpers_invert() {
    let bytes = parse_mac("0a:1b:2c:3d:4e:5f").unwrap();
    assert_eq!(format_mac(&bytes), "0a:1b:2c:3d:4e:5f");
    assert!(parse_mac("zz:zz").is_err());
}
