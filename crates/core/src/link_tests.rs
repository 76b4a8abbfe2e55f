// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;
use crate::entity::Entity;

#[test]
fn state_derives_from_flags() {
    let mut link = LinkRecord { flags: IFF_UP | 0x40, ..LinkRecord::default() };
    link.sync_state();
    assert_eq!(link.state, LinkState::Up);

    link.flags = 0x40;
    link.sync_state();
    assert_eq!(link.state, LinkState::Down);
}

#[test]
fn writing_state_translates_to_flags() {
    let mut link = LinkRecord::default();
    link.set_field("state", &json!("up")).unwrap();
    assert_eq!(link.flags & IFF_UP, IFF_UP);
    assert_eq!(link.state, LinkState::Up);

    link.set_field("state", &json!("down")).unwrap();
    assert_eq!(link.flags & IFF_UP, 0);
    assert_eq!(link.state, LinkState::Down);
}

#[test]
fn writing_state_rejects_other_words() {
    let mut link = LinkRecord::default();
    assert!(link.set_field("state", &json!("sideways")).is_err());
}

#[test]
fn state_serializes_lowercase() {
    let mut link = LinkRecord::default();
    link.set_field("state", &json!("up")).unwrap();
    assert_eq!(link.field("state"), Some(json!("up")));
}

#[test]
fn master_accepts_null_to_clear() {
    let mut link = LinkRecord::default();
    link.set_field("master", &json!(7)).unwrap();
    assert_eq!(link.master, Some(7));
    link.set_field("master", &json!(null)).unwrap();
    assert_eq!(link.master, None);
}

#[test]
fn unknown_field_is_rejected() {
    let mut link = LinkRecord::default();
    assert!(matches!(
        link.set_field("txqlen2", &json!(1)),
        Err(crate::Error::UnknownField(_))
    ));
}

#[test]
fn changes_up_sets_value_and_mask() {
    assert_eq!(LinkChanges::up(true).flags, Some((IFF_UP, IFF_UP)));
    assert_eq!(LinkChanges::up(false).flags, Some((0, IFF_UP)));
    assert!(LinkChanges::default().is_empty());
}
