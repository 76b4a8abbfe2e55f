// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Entity` trait: the common contract of all record types stored in
//! the database. One implementation per RTNL message family.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::Value;

/// Field-name → expected-value filter. The basis for view constraints,
/// `wait()` predicates, and echo confirmation by natural key.
pub type Match = BTreeMap<String, Value>;

/// Which table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Link,
    Address,
    Route,
    Neighbour,
    Rule,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Link => "interfaces",
            EntityKind::Address => "addresses",
            EntityKind::Route => "routes",
            EntityKind::Neighbour => "neighbours",
            EntityKind::Rule => "rules",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// A record stored in one table, keyed per target by `Self::Key`.
pub trait Entity:
    Clone + std::fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Composite table key (the `target` prefix is added by the store).
    type Key: Clone + Ord + Eq + std::fmt::Debug + Send + Sync + 'static;

    const KIND: EntityKind;

    fn key(&self) -> Self::Key;

    /// Column order for `dump()` reports. The leading `target` column is
    /// supplied by the store.
    fn columns() -> &'static [&'static str];

    /// Column order for `summary()` reports.
    fn summary_columns() -> &'static [&'static str];

    /// Set one attribute from a generic value, validating name and type.
    fn set_field(&mut self, name: &str, value: &Value) -> Result<(), Error>;

    /// The record as a JSON object, one property per field.
    fn to_row(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.to_row().get(name).cloned()
    }

    /// True when every pair in `spec` equals the corresponding field.
    fn matches(&self, spec: &Match) -> bool {
        let row = self.to_row();
        spec.iter().all(|(name, want)| row.get(name).is_some_and(|have| have == want))
    }
}

// -- value conversion helpers, shared by the per-family `set_field` impls --

pub fn as_str(field: &str, value: &Value) -> Result<String, Error> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_value(field, value))
}

pub fn as_u32(field: &str, value: &Value) -> Result<u32, Error> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::invalid_value(field, value))
}

pub fn as_u16(field: &str, value: &Value) -> Result<u16, Error> {
    value
        .as_u64()
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| Error::invalid_value(field, value))
}

pub fn as_u8(field: &str, value: &Value) -> Result<u8, Error> {
    value
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| Error::invalid_value(field, value))
}

/// Parse an IP address value, given either as a JSON string or null.
pub fn parse_ip(field: &str, value: &Value) -> Result<IpAddr, Error> {
    as_str(field, value)?.parse().map_err(|_| Error::invalid_value(field, value))
}

/// Normalize a MAC address string to lower-case colon form.
pub fn as_mac(field: &str, value: &Value) -> Result<String, Error> {
    let raw = as_str(field, value)?;
    let mac = raw.to_ascii_lowercase();
    let valid = mac.split(':').count() == 6
        && mac.split(':').all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(mac)
    } else {
        Err(Error::invalid_value(field, value))
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
