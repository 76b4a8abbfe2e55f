// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route records (`rtmsg` family).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::entity::{as_u32, as_u8, parse_ip, Entity, EntityKind};
use crate::error::Error;
use crate::{Value, AF_INET, AF_INET6};

/// Main routing table number.
pub const RT_TABLE_MAIN: u32 = 254;

/// One next hop of a multipath route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHop {
    pub oif: u32,
    pub gateway: Option<IpAddr>,
    pub hops: u8,
}

/// Composite key of one `routes` row. `dst: None` is the default route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub family: u8,
    pub dst: Option<IpAddr>,
    pub dst_len: u8,
    pub table: u32,
    pub priority: u32,
    pub tos: u8,
}

/// One row of the `routes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub family: u8,
    pub dst: Option<IpAddr>,
    pub dst_len: u8,
    pub table: u32,
    pub priority: u32,
    pub tos: u8,
    pub protocol: u8,
    pub scope: u8,
    pub route_type: u8,
    pub oif: Option<u32>,
    pub gateway: Option<IpAddr>,
    /// Next hops of a multipath route; stored as a JSON list.
    pub multipath: Vec<NextHop>,
}

impl Default for RouteRecord {
    fn default() -> Self {
        Self {
            family: AF_INET,
            dst: None,
            dst_len: 0,
            table: RT_TABLE_MAIN,
            priority: 0,
            tos: 0,
            protocol: 0,
            scope: 0,
            route_type: 1, // unicast
            oif: None,
            gateway: None,
            multipath: Vec::new(),
        }
    }
}

impl RouteRecord {
    /// Keep `family` consistent with the destination or gateway value.
    pub fn sync_family(&mut self) {
        if let Some(ip) = self.dst.or(self.gateway) {
            self.family = if ip.is_ipv4() { AF_INET } else { AF_INET6 };
        }
    }
}

impl Entity for RouteRecord {
    type Key = RouteKey;

    const KIND: EntityKind = EntityKind::Route;

    fn key(&self) -> RouteKey {
        RouteKey {
            family: self.family,
            dst: self.dst,
            dst_len: self.dst_len,
            table: self.table,
            priority: self.priority,
            tos: self.tos,
        }
    }

    fn columns() -> &'static [&'static str] {
        &[
            "family",
            "dst",
            "dst_len",
            "table",
            "priority",
            "tos",
            "protocol",
            "scope",
            "route_type",
            "oif",
            "gateway",
            "multipath",
        ]
    }

    fn summary_columns() -> &'static [&'static str] {
        &["dst", "dst_len", "table", "gateway", "oif"]
    }

    fn set_field(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name {
            "family" => self.family = as_u8(name, value)?,
            "dst" => {
                // Accept "net/len" shorthand as well as a bare address.
                if let Some(text) = value.as_str() {
                    if let Some((net, len)) = text.split_once('/') {
                        self.dst = Some(
                            net.parse().map_err(|_| Error::invalid_value(name, value))?,
                        );
                        self.dst_len =
                            len.parse().map_err(|_| Error::invalid_value(name, value))?;
                        self.sync_family();
                        return Ok(());
                    }
                }
                self.dst = Some(parse_ip(name, value)?);
                self.sync_family();
            }
            "dst_len" => self.dst_len = as_u8(name, value)?,
            "table" => self.table = as_u32(name, value)?,
            "priority" => self.priority = as_u32(name, value)?,
            "tos" => self.tos = as_u8(name, value)?,
            "protocol" => self.protocol = as_u8(name, value)?,
            "scope" => self.scope = as_u8(name, value)?,
            "route_type" => self.route_type = as_u8(name, value)?,
            "oif" => self.oif = Some(as_u32(name, value)?),
            "gateway" => {
                self.gateway = Some(parse_ip(name, value)?);
                self.sync_family();
            }
            "multipath" => {
                self.multipath = serde_json::from_value(value.clone())
                    .map_err(|_| Error::invalid_value(name, value))?;
            }
            _ => return Err(Error::UnknownField(name.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
