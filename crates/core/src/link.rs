// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interface records (`ifinfmsg` family).

use serde::{Deserialize, Serialize};

use crate::entity::{as_mac, as_str, as_u16, as_u32, as_u8, Entity, EntityKind};
use crate::error::Error;
use crate::Value;

/// `IFF_UP` bit of the interface flags word.
pub const IFF_UP: u32 = 0x1;

/// Administrative state, derived from `flags` on every load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    #[default]
    Down,
}

impl LinkState {
    pub fn from_flags(flags: u32) -> Self {
        if flags & IFF_UP != 0 {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }
}

/// One row of the `interfaces` table, keyed by `(target, index)`.
///
/// Kind-specific attributes are flattened into optional columns; rows of
/// kind `bridge` and `vlan` are additionally mirrored into the specialized
/// tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkRecord {
    pub index: u32,
    pub ifname: String,
    /// Link-layer address, lower-case colon form.
    pub address: Option<String>,
    pub flags: u32,
    /// Derived from `flags & IFF_UP`; writable as `"up"`/`"down"`.
    pub state: LinkState,
    pub kind: Option<String>,
    pub master: Option<u32>,
    /// Parent interface for VLAN / VXLAN kinds.
    pub link: Option<u32>,
    pub mtu: Option<u32>,
    pub vlan_id: Option<u16>,
    pub vlan_protocol: Option<u16>,
    pub br_stp_state: Option<u32>,
    pub br_vlan_filtering: Option<u8>,
    pub vxlan_id: Option<u32>,
    pub vxlan_link: Option<u32>,
    pub vxlan_port: Option<u16>,
    pub vrf_table: Option<u32>,
}

impl LinkRecord {
    /// Recompute the derived `state` column. Called on every load.
    pub fn sync_state(&mut self) {
        self.state = LinkState::from_flags(self.flags);
    }

    pub fn is_up(&self) -> bool {
        self.flags & IFF_UP != 0
    }
}

impl Entity for LinkRecord {
    type Key = u32;

    const KIND: EntityKind = EntityKind::Link;

    fn key(&self) -> u32 {
        self.index
    }

    fn columns() -> &'static [&'static str] {
        &[
            "index",
            "ifname",
            "address",
            "flags",
            "state",
            "kind",
            "master",
            "link",
            "mtu",
            "vlan_id",
            "vlan_protocol",
            "br_stp_state",
            "br_vlan_filtering",
            "vxlan_id",
            "vxlan_link",
            "vxlan_port",
            "vrf_table",
        ]
    }

    fn summary_columns() -> &'static [&'static str] {
        &["index", "ifname", "address", "state"]
    }

    fn set_field(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name {
            "index" => self.index = as_u32(name, value)?,
            "ifname" => self.ifname = as_str(name, value)?,
            "address" => self.address = Some(as_mac(name, value)?),
            "flags" => {
                self.flags = as_u32(name, value)?;
                self.sync_state();
            }
            // Writing the derived column translates to a flags delta.
            "state" => {
                match as_str(name, value)?.as_str() {
                    "up" => self.flags |= IFF_UP,
                    "down" => self.flags &= !IFF_UP,
                    _ => return Err(Error::invalid_value(name, value)),
                }
                self.sync_state();
            }
            "kind" => self.kind = Some(as_str(name, value)?),
            "master" => {
                self.master = if value.is_null() { None } else { Some(as_u32(name, value)?) }
            }
            "link" => self.link = Some(as_u32(name, value)?),
            "mtu" => self.mtu = Some(as_u32(name, value)?),
            "vlan_id" => self.vlan_id = Some(as_u16(name, value)?),
            "vlan_protocol" => self.vlan_protocol = Some(as_u16(name, value)?),
            "br_stp_state" => self.br_stp_state = Some(as_u32(name, value)?),
            "br_vlan_filtering" => self.br_vlan_filtering = Some(as_u8(name, value)?),
            "vxlan_id" => self.vxlan_id = Some(as_u32(name, value)?),
            "vxlan_link" => self.vxlan_link = Some(as_u32(name, value)?),
            "vxlan_port" => self.vxlan_port = Some(as_u16(name, value)?),
            "vrf_table" => self.vrf_table = Some(as_u32(name, value)?),
            _ => return Err(Error::UnknownField(name.to_string())),
        }
        Ok(())
    }
}

/// Attribute deltas for an interface update request.
///
/// `flags` carries `(value, mask)` so a single bit can be toggled without
/// clobbering the rest of the word; `master: Some(0)` detaches a port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkChanges {
    pub flags: Option<(u32, u32)>,
    pub master: Option<u32>,
    pub mtu: Option<u32>,
    pub address: Option<String>,
}

impl LinkChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn up(value: bool) -> Self {
        Self {
            flags: Some((if value { IFF_UP } else { 0 }, IFF_UP)),
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
