// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Address records (`ifaddrmsg` family).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::entity::{as_u32, as_u8, parse_ip, Entity, EntityKind};
use crate::error::Error;
use crate::{Value, AF_INET, AF_INET6};

/// Composite key of one `addresses` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressKey {
    pub index: u32,
    pub address: IpAddr,
    pub prefixlen: u8,
    pub family: u8,
}

/// One row of the `addresses` table.
///
/// Holds a logical foreign reference to the owning interface by
/// `(target, index)`; the cascade on interface removal is applied by the
/// database manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub index: u32,
    pub address: IpAddr,
    pub prefixlen: u8,
    pub family: u8,
    pub scope: u8,
    pub label: Option<String>,
}

impl AddressRecord {
    pub fn new(index: u32, address: IpAddr, prefixlen: u8) -> Self {
        Self {
            index,
            address,
            prefixlen,
            family: if address.is_ipv4() { AF_INET } else { AF_INET6 },
            scope: 0,
            label: None,
        }
    }

    /// Keep `family` consistent with the address value.
    pub fn sync_family(&mut self) {
        self.family = if self.address.is_ipv4() { AF_INET } else { AF_INET6 };
    }
}

impl Default for AddressRecord {
    fn default() -> Self {
        Self::new(0, IpAddr::from([0, 0, 0, 0]), 0)
    }
}

impl Entity for AddressRecord {
    type Key = AddressKey;

    const KIND: EntityKind = EntityKind::Address;

    fn key(&self) -> AddressKey {
        AddressKey {
            index: self.index,
            address: self.address,
            prefixlen: self.prefixlen,
            family: self.family,
        }
    }

    fn columns() -> &'static [&'static str] {
        &["index", "address", "prefixlen", "family", "scope", "label"]
    }

    fn summary_columns() -> &'static [&'static str] {
        &["index", "address", "prefixlen"]
    }

    fn set_field(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name {
            "index" => self.index = as_u32(name, value)?,
            "address" => {
                self.address = parse_ip(name, value)?;
                self.sync_family();
            }
            "prefixlen" => self.prefixlen = as_u8(name, value)?,
            "family" => self.family = as_u8(name, value)?,
            "scope" => self.scope = as_u8(name, value)?,
            "label" => {
                self.label = value.as_str().map(str::to_string);
            }
            _ => return Err(Error::UnknownField(name.to_string())),
        }
        Ok(())
    }
}
