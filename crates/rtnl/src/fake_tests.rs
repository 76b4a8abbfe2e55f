// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use netdb_core::LinkChanges;

fn dummy_spec(ifname: &str) -> LinkRecord {
    let mut spec = LinkRecord::default();
    spec.ifname = ifname.to_string();
    spec.kind = Some("dummy".to_string());
    spec
}

fn bound_channel(kernel: &FakeKernel) -> Arc<dyn RtnlChannel> {
    let channel = kernel.transport().connect(&TransportOptions::new()).unwrap();
    channel.bind().unwrap();
    channel
}

#[test]
fn add_link_allocates_indices_and_echoes() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);

    channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))).unwrap();
    channel.submit(&RtnlRequest::AddLink(dummy_spec("d1"))).unwrap();

    assert_eq!(kernel.link("d0").unwrap().index, 1);
    assert_eq!(kernel.link("d1").unwrap().index, 2);

    let echo = channel.recv().unwrap();
    assert!(matches!(&echo[0], RtnlEvent::NewLink(l) if l.ifname == "d0"));
}

#[test]
fn unsupported_kind_fails_with_95() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    let mut spec = dummy_spec("x");
    spec.kind = Some("nosuch".to_string());
    match channel.submit(&RtnlRequest::AddLink(spec)) {
        Err(ChannelError::Netlink { code, .. }) => assert_eq!(code, 95),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(!kernel.has_link("x"));
}

#[test]
fn duplicate_link_fails_with_17() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))).unwrap();
    match channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))) {
        Err(ChannelError::Netlink { code, .. }) => assert_eq!(code, 17),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn del_link_cascades_addresses_and_routes() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))).unwrap();
    let index = kernel.link("d0").unwrap().index;

    let addr = AddressRecord::new(index, "10.0.0.2".parse().unwrap(), 24);
    channel.submit(&RtnlRequest::AddAddress(addr)).unwrap();

    let mut route = RouteRecord::default();
    route.dst = Some("10.0.1.0".parse().unwrap());
    route.dst_len = 24;
    route.gateway = Some("10.0.0.1".parse().unwrap());
    channel.submit(&RtnlRequest::AddRoute(route)).unwrap();
    assert_eq!(kernel.route_count(), 1);

    channel.submit(&RtnlRequest::DelLink { index }).unwrap();
    assert!(!kernel.has_link("d0"));
    assert!(kernel.addresses_of("d0").is_empty());
    assert_eq!(kernel.route_count(), 0);

    // Cascade events precede the link removal event.
    let mut names = Vec::new();
    while let Ok(batch) = channel.recv() {
        for event in batch {
            names.push(event.name());
        }
        if names.last() == Some(&"link:del") {
            break;
        }
    }
    let del_addr = names.iter().position(|n| *n == "address:del").unwrap();
    let del_link = names.iter().position(|n| *n == "link:del").unwrap();
    assert!(del_addr < del_link);
}

#[test]
fn gateway_outside_subnets_is_unreachable() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))).unwrap();

    let mut route = RouteRecord::default();
    route.dst = Some("10.0.1.0".parse().unwrap());
    route.dst_len = 24;
    route.gateway = Some("192.168.9.1".parse().unwrap());
    match channel.submit(&RtnlRequest::AddRoute(route)) {
        Err(ChannelError::Netlink { code, .. }) => assert_eq!(code, 101),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn gateway_resolves_output_interface() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))).unwrap();
    let index = kernel.link("d0").unwrap().index;
    channel
        .submit(&RtnlRequest::AddAddress(AddressRecord::new(
            index,
            "10.0.0.2".parse().unwrap(),
            24,
        )))
        .unwrap();

    let mut route = RouteRecord::default();
    route.dst = Some("10.0.1.0".parse().unwrap());
    route.dst_len = 24;
    route.gateway = Some("10.0.0.1".parse().unwrap());
    channel.submit(&RtnlRequest::AddRoute(route.clone())).unwrap();

    let state = kernel.state.lock();
    let stored = state.routes.values().next().unwrap();
    assert_eq!(stored.oif, Some(index));
}

#[test]
fn deleting_a_bridge_releases_ports() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    let mut bridge = dummy_spec("br0");
    bridge.kind = Some("bridge".to_string());
    channel.submit(&RtnlRequest::AddLink(bridge)).unwrap();
    channel.submit(&RtnlRequest::AddLink(dummy_spec("p0"))).unwrap();
    let br = kernel.link("br0").unwrap().index;
    let p0 = kernel.link("p0").unwrap().index;
    channel
        .submit(&RtnlRequest::SetLink {
            index: p0,
            changes: LinkChanges { master: Some(br), ..LinkChanges::default() },
        })
        .unwrap();
    assert_eq!(kernel.link("p0").unwrap().master, Some(br));

    channel.submit(&RtnlRequest::DelLink { index: br }).unwrap();
    assert_eq!(kernel.link("p0").unwrap().master, None);
}

#[test]
fn closed_channel_reports_closed() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    channel.close();
    assert!(matches!(channel.recv(), Err(ChannelError::Closed)));
    assert!(matches!(
        channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))),
        Err(ChannelError::Closed)
    ));
}

#[test]
fn failed_connection_reports_transient_io_error() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    kernel.fail_connections();
    match channel.recv() {
        Err(e) => assert!(e.is_transient()),
        Ok(batch) => panic!("unexpected batch {:?}", batch),
    }
}

#[test]
fn dumps_are_filtered_by_family() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    channel.submit(&RtnlRequest::AddLink(dummy_spec("d0"))).unwrap();
    let index = kernel.link("d0").unwrap().index;
    channel
        .submit(&RtnlRequest::AddAddress(AddressRecord::new(
            index,
            "10.0.0.2".parse().unwrap(),
            24,
        )))
        .unwrap();
    channel
        .submit(&RtnlRequest::AddAddress(AddressRecord::new(
            index,
            "fd00::2".parse().unwrap(),
            64,
        )))
        .unwrap();

    let mut v4 = RouteRecord::default();
    v4.dst = Some("10.0.1.0".parse().unwrap());
    v4.dst_len = 24;
    v4.gateway = Some("10.0.0.1".parse().unwrap());
    channel.submit(&RtnlRequest::AddRoute(v4)).unwrap();

    let mut v6 = RouteRecord::default();
    v6.dst = Some("fd00:1::".parse().unwrap());
    v6.dst_len = 64;
    v6.gateway = Some("fd00::1".parse().unwrap());
    channel.submit(&RtnlRequest::AddRoute(v6)).unwrap();

    assert_eq!(channel.dump(DumpKind::RoutesV4).unwrap().len(), 1);
    assert_eq!(channel.dump(DumpKind::RoutesV6).unwrap().len(), 1);
    assert_eq!(channel.dump(DumpKind::Addresses).unwrap().len(), 2);
    assert!(channel.dump(DumpKind::RoutesMpls).unwrap().is_empty());
}

#[test]
fn recv_wakes_on_close_from_another_thread() {
    let kernel = FakeKernel::new();
    let channel = bound_channel(&kernel);
    let closer = Arc::clone(&channel);
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        closer.close();
    });
    assert!(matches!(channel.recv(), Err(ChannelError::Closed)));
    handle.join().unwrap();
}
