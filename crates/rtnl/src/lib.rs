// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The RTNL channel boundary.
//!
//! A [`RtnlChannel`] is one connection to a kernel: it can subscribe to the
//! rtnetlink multicast groups, run bulk dumps, submit acknowledged
//! mutation requests, and deliver spontaneous event batches. The database
//! core is written against the trait; this crate ships the Linux netlink
//! implementation, a network-namespace variant, and (behind the `fake`
//! feature) an in-process kernel double used by tests.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use netdb_core::{DumpKind, EventBatch, RtnlRequest, Value};

#[cfg(target_os = "linux")]
mod codec;
#[cfg(target_os = "linux")]
mod netns;
#[cfg(target_os = "linux")]
mod socket;

#[cfg(feature = "fake")]
mod fake;

#[cfg(target_os = "linux")]
pub use netns::NetnsTransport;
#[cfg(target_os = "linux")]
pub use socket::{LocalTransport, NetlinkChannel};

#[cfg(feature = "fake")]
pub use fake::{FakeKernel, FakeTransport};

/// Errors raised at the channel boundary.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The kernel rejected a request; `code` is the positive errno.
    #[error("netlink error {code}: {msg}")]
    Netlink { code: i32, msg: String },

    /// The channel was closed, locally or by the peer (ECONNRESET). The
    /// reader treats this as a graceful stop, never as a failure.
    #[error("channel closed")]
    Closed,

    /// A malformed message that could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("transport not available: {0}")]
    Unsupported(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    pub fn netlink(code: i32, msg: impl Into<String>) -> Self {
        Self::Netlink { code, msg: msg.into() }
    }

    /// Transient errors let a persistent source restart; permanent ones
    /// propagate to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Io(_))
    }
}

impl From<ChannelError> for netdb_core::Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Netlink { code, msg } => netdb_core::Error::Netlink { code, msg },
            ChannelError::Unsupported(kind) => netdb_core::Error::UnsupportedTransport(kind),
            other => netdb_core::Error::Channel(other.to_string()),
        }
    }
}

/// One connection to a kernel endpoint.
///
/// Implementations are internally synchronized: `recv` is called from the
/// source reader thread while `dump`/`submit`/`close` may be called from
/// API threads.
pub trait RtnlChannel: Send + Sync {
    /// Subscribe to the link/addr/route/neigh/rule multicast groups.
    fn bind(&self) -> Result<(), ChannelError>;

    /// Run one bulk dump and return the decoded rows.
    fn dump(&self, kind: DumpKind) -> Result<EventBatch, ChannelError>;

    /// Send one acknowledged mutation request.
    fn submit(&self, request: &RtnlRequest) -> Result<(), ChannelError>;

    /// Block until the next event batch arrives. Returns
    /// [`ChannelError::Closed`] after `close`.
    fn recv(&self) -> Result<EventBatch, ChannelError>;

    /// Close the channel and unblock any pending `recv`.
    fn close(&self);
}

/// Source options as persisted in the `sources_options` table, keyed by
/// option name.
pub type TransportOptions = BTreeMap<String, Value>;

/// Factory for channels of one source kind (`local`, `netns`, `remote`,
/// or anything registered by the embedding application).
pub trait Transport: Send + Sync {
    fn connect(&self, options: &TransportOptions) -> Result<Arc<dyn RtnlChannel>, ChannelError>;
}
