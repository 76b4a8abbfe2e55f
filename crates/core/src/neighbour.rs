// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Neighbour records (`ndmsg` family).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::entity::{as_mac, as_u16, as_u32, as_u8, parse_ip, Entity, EntityKind};
use crate::error::Error;
use crate::{Value, AF_INET, AF_INET6};

/// `NUD_PERMANENT` neighbour cache state.
pub const NUD_PERMANENT: u16 = 0x80;

/// Composite key of one `neighbours` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NeighbourKey {
    pub ifindex: u32,
    pub dst: IpAddr,
    pub family: u8,
}

/// One row of the `neighbours` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighbourRecord {
    pub ifindex: u32,
    pub dst: IpAddr,
    pub family: u8,
    pub lladdr: Option<String>,
    /// Neighbour cache state bits (`NUD_*`).
    pub nud_state: u16,
}

impl Default for NeighbourRecord {
    fn default() -> Self {
        Self {
            ifindex: 0,
            dst: IpAddr::from([0, 0, 0, 0]),
            family: AF_INET,
            lladdr: None,
            nud_state: 0,
        }
    }
}

impl NeighbourRecord {
    pub fn sync_family(&mut self) {
        self.family = if self.dst.is_ipv4() { AF_INET } else { AF_INET6 };
    }
}

impl Entity for NeighbourRecord {
    type Key = NeighbourKey;

    const KIND: EntityKind = EntityKind::Neighbour;

    fn key(&self) -> NeighbourKey {
        NeighbourKey { ifindex: self.ifindex, dst: self.dst, family: self.family }
    }

    fn columns() -> &'static [&'static str] {
        &["ifindex", "dst", "family", "lladdr", "nud_state"]
    }

    fn summary_columns() -> &'static [&'static str] {
        &["ifindex", "dst", "lladdr"]
    }

    fn set_field(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name {
            "ifindex" => self.ifindex = as_u32(name, value)?,
            "dst" => {
                self.dst = parse_ip(name, value)?;
                self.sync_family();
            }
            "family" => self.family = as_u8(name, value)?,
            "lladdr" => self.lladdr = Some(as_mac(name, value)?),
            "nud_state" => self.nud_state = as_u16(name, value)?,
            _ => return Err(Error::UnknownField(name.to_string())),
        }
        Ok(())
    }
}
