// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing policy rule records (`fibmsg` family).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::entity::{as_u32, as_u8, parse_ip, Entity, EntityKind};
use crate::error::Error;
use crate::{Value, AF_INET};

/// Composite key of one `rules` row: the full selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub family: u8,
    pub priority: u32,
    pub table: u32,
    pub src: Option<IpAddr>,
    pub src_len: u8,
    pub dst: Option<IpAddr>,
    pub dst_len: u8,
    pub tos: u8,
}

/// One row of the `rules` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub family: u8,
    pub priority: u32,
    pub table: u32,
    pub src: Option<IpAddr>,
    pub src_len: u8,
    pub dst: Option<IpAddr>,
    pub dst_len: u8,
    pub tos: u8,
    /// `FR_ACT_*` action; `1` is "to table".
    pub action: u8,
    pub fwmark: Option<u32>,
}

impl Default for RuleRecord {
    fn default() -> Self {
        Self {
            family: AF_INET,
            priority: 0,
            table: 0,
            src: None,
            src_len: 0,
            dst: None,
            dst_len: 0,
            tos: 0,
            action: 1,
            fwmark: None,
        }
    }
}

impl Entity for RuleRecord {
    type Key = RuleKey;

    const KIND: EntityKind = EntityKind::Rule;

    fn key(&self) -> RuleKey {
        RuleKey {
            family: self.family,
            priority: self.priority,
            table: self.table,
            src: self.src,
            src_len: self.src_len,
            dst: self.dst,
            dst_len: self.dst_len,
            tos: self.tos,
        }
    }

    fn columns() -> &'static [&'static str] {
        &["family", "priority", "table", "src", "src_len", "dst", "dst_len", "tos", "action", "fwmark"]
    }

    fn summary_columns() -> &'static [&'static str] {
        &["priority", "src", "dst", "table"]
    }

    fn set_field(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        match name {
            "family" => self.family = as_u8(name, value)?,
            "priority" => self.priority = as_u32(name, value)?,
            "table" => self.table = as_u32(name, value)?,
            "src" => self.src = Some(parse_ip(name, value)?),
            "src_len" => self.src_len = as_u8(name, value)?,
            "dst" => self.dst = Some(parse_ip(name, value)?),
            "dst_len" => self.dst_len = as_u8(name, value)?,
            "tos" => self.tos = as_u8(name, value)?,
            "action" => self.action = as_u8(name, value)?,
            "fwmark" => self.fwmark = Some(as_u32(name, value)?),
            _ => return Err(Error::UnknownField(name.to_string())),
        }
        Ok(())
    }
}
