// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;
use yare::parameterized;

use super::*;
use crate::link::LinkRecord;

#[test]
fn matches_compares_selected_fields_only() {
    let mut link = LinkRecord::default();
    link.index = 3;
    link.ifname = "eth0".to_string();

    let mut spec = Match::new();
    spec.insert("ifname".to_string(), json!("eth0"));
    assert!(link.matches(&spec));

    spec.insert("index".to_string(), json!(4));
    assert!(!link.matches(&spec));
}

#[test]
fn matches_rejects_unknown_field() {
    let link = LinkRecord::default();
    let mut spec = Match::new();
    spec.insert("no_such_column".to_string(), json!(1));
    assert!(!link.matches(&spec));
}

#[test]
fn field_reads_through_json_row() {
    let mut link = LinkRecord::default();
    link.ifname = "br0".to_string();
    assert_eq!(link.field("ifname"), Some(json!("br0")));
    assert_eq!(link.field("master"), Some(json!(null)));
    assert_eq!(link.field("bogus"), None);
}

#[parameterized(
    zero = { "00:11:22:33:44:55" },
    upper = { "AA:BB:CC:DD:EE:FF" },
)]
fn mac_normalizes(raw: &str) {
    let mac = as_mac("address", &json!(raw)).unwrap();
    assert_eq!(mac, raw.to_ascii_lowercase());
}

#[parameterized(
    short = { "00:11:22" },
    text = { "not-a-mac" },
    wide = { "001:11:22:33:44:55" },
)]
fn mac_rejects_malformed(raw: &str) {
    assert!(as_mac("address", &json!(raw)).is_err());
}

#[test]
fn numeric_conversions_check_range() {
    assert_eq!(as_u8("x", &json!(255)).unwrap(), 255);
    assert!(as_u8("x", &json!(256)).is_err());
    assert!(as_u16("x", &json!(70_000)).is_err());
    assert!(as_u32("x", &json!(-1)).is_err());
    assert!(as_u32("x", &json!("12")).is_err());
}

#[test]
fn parse_ip_accepts_both_families() {
    assert!(parse_ip("dst", &json!("10.0.0.1")).unwrap().is_ipv4());
    assert!(parse_ip("dst", &json!("fe80::1")).unwrap().is_ipv6());
    assert!(parse_ip("dst", &json!("10.0.0")).is_err());
}
