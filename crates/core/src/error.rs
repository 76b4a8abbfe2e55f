// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-facing error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::target::Target;

/// Errors surfaced through the public database API.
///
/// `Netlink` carries the numeric kernel error code (e.g. 17 "exists",
/// 95 "operation not supported") so callers can branch on it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("netlink error {code}: {msg}")]
    Netlink { code: i32, msg: String },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid object state: {0}")]
    InvalidState(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("invalid key: {0}")]
    BadKey(String),

    #[error("no row matching {0}")]
    NotFound(String),

    #[error("source {0} is not registered")]
    NoSource(Target),

    #[error("source {0} already exists")]
    SourceExists(Target),

    #[error("unsupported transport kind: {0}")]
    UnsupportedTransport(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("database manager terminated: {0}")]
    Fatal(String),
}

impl Error {
    /// Shorthand for a kernel-side netlink failure.
    pub fn netlink(code: i32, msg: impl Into<String>) -> Self {
        Self::Netlink { code, msg: msg.into() }
    }

    pub fn invalid_value(field: &str, value: &crate::Value) -> Self {
        Self::InvalidValue { field: field.to_string(), value: value.to_string() }
    }
}
