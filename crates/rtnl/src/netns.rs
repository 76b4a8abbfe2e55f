// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel construction inside a named network namespace.
//!
//! Sockets keep the namespace they were created in, so the transport
//! enters the namespace on a short-lived helper thread, opens the channel
//! there, and hands it back.

use std::io;
use std::sync::Arc;

use nix::sched::{setns, CloneFlags};

use crate::socket::NetlinkChannel;
use crate::{ChannelError, RtnlChannel, Transport, TransportOptions};

const NETNS_RUN_DIR: &str = "/var/run/netns";

/// Channels speaking to the kernel of a named network namespace
/// (`ip netns add <name>` convention).
pub struct NetnsTransport;

impl Transport for NetnsTransport {
    fn connect(&self, options: &TransportOptions) -> Result<Arc<dyn RtnlChannel>, ChannelError> {
        let name = options
            .get("netns")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::Unsupported("netns sources need a netns option".to_string()))?;
        connect_in_netns(name.to_string())
    }
}

fn connect_in_netns(name: String) -> Result<Arc<dyn RtnlChannel>, ChannelError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name(format!("netdb-netns-{name}"))
        .spawn(move || {
            let _ = tx.send(enter_and_open(&name));
        })?;
    rx.recv()
        .map_err(|_| ChannelError::Unsupported("netns helper thread died".to_string()))?
}

fn enter_and_open(name: &str) -> Result<Arc<dyn RtnlChannel>, ChannelError> {
    let path = format!("{NETNS_RUN_DIR}/{name}");
    let file = std::fs::File::open(path)?;
    setns(&file, CloneFlags::CLONE_NEWNET)
        .map_err(|e| ChannelError::Io(io::Error::from_raw_os_error(e as i32)))?;
    Ok(Arc::new(NetlinkChannel::new()?))
}
