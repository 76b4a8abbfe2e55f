// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Linux netlink channel: two `AF_NETLINK`/`NETLINK_ROUTE` sockets,
//! one bound to the multicast groups for spontaneous events, one for
//! acknowledged unicasts and dumps.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use netlink_packet_route::RtnlMessage;
use netlink_sys::protocols::NETLINK_ROUTE;
use netlink_sys::Socket;
use parking_lot::Mutex;
use tracing::warn;

use netdb_core::{DumpKind, EventBatch, RtnlRequest};

use crate::codec::{self, Reply};
use crate::{ChannelError, RtnlChannel, Transport, TransportOptions};

// rtnetlink multicast groups joined by the event socket.
const RTNLGRP_LINK: u32 = 1;
const RTNLGRP_NEIGH: u32 = 3;
const RTNLGRP_TC: u32 = 4;
const RTNLGRP_IPV4_IFADDR: u32 = 5;
const RTNLGRP_IPV4_ROUTE: u32 = 7;
const RTNLGRP_IPV4_RULE: u32 = 8;
const RTNLGRP_IPV6_IFADDR: u32 = 9;
const RTNLGRP_IPV6_ROUTE: u32 = 11;
const RTNLGRP_IPV6_RULE: u32 = 19;
const RTNLGRP_MPLS_ROUTE: u32 = 27;

const GROUPS: &[u32] = &[
    RTNLGRP_LINK,
    RTNLGRP_NEIGH,
    RTNLGRP_TC,
    RTNLGRP_IPV4_IFADDR,
    RTNLGRP_IPV4_ROUTE,
    RTNLGRP_IPV4_RULE,
    RTNLGRP_IPV6_IFADDR,
    RTNLGRP_IPV6_ROUTE,
    RTNLGRP_IPV6_RULE,
    RTNLGRP_MPLS_ROUTE,
];

/// Socket close on the receive path.
const ECONNRESET: i32 = 104;

/// Pause between non-blocking receive attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for the kernel to answer a unicast or a dump.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// One live `NETLINK_ROUTE` connection to the kernel of the current
/// network namespace.
pub struct NetlinkChannel {
    events: Mutex<Socket>,
    requests: Mutex<RequestSocket>,
    closed: AtomicBool,
}

struct RequestSocket {
    socket: Socket,
    seq: u32,
}

impl NetlinkChannel {
    pub fn new() -> Result<Self, ChannelError> {
        let mut events = Socket::new(NETLINK_ROUTE)?;
        events.bind_auto()?;
        events.set_non_blocking(true)?;
        let mut requests = Socket::new(NETLINK_ROUTE)?;
        requests.bind_auto()?;
        requests.set_non_blocking(true)?;
        Ok(Self {
            events: Mutex::new(events),
            requests: Mutex::new(RequestSocket { socket: requests, seq: 0 }),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Receive one datagram, polling so that `closed` interrupts the wait.
fn recv_datagram(
    socket: &Socket,
    closed: &AtomicBool,
    deadline: Option<Instant>,
) -> Result<Vec<u8>, ChannelError> {
    loop {
        if closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        match socket.recv_from_full() {
            Ok((bytes, _addr)) => return Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(ChannelError::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "no reply from the kernel",
                        )));
                    }
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) if e.raw_os_error() == Some(ECONNRESET) => return Err(ChannelError::Closed),
            Err(e) => return Err(ChannelError::Io(e)),
        }
    }
}

fn errno_message(code: i32) -> String {
    io::Error::from_raw_os_error(code).to_string()
}

impl RequestSocket {
    fn send(&mut self, msg: RtnlMessage, flags: u16) -> Result<u32, ChannelError> {
        self.seq = self.seq.wrapping_add(1);
        let bytes = codec::seal(msg, flags, self.seq);
        self.socket.send(&bytes, 0)?;
        Ok(self.seq)
    }
}

impl RtnlChannel for NetlinkChannel {
    fn bind(&self) -> Result<(), ChannelError> {
        self.ensure_open()?;
        let mut events = self.events.lock();
        for group in GROUPS {
            events.add_membership(*group)?;
        }
        Ok(())
    }

    fn dump(&self, kind: DumpKind) -> Result<EventBatch, ChannelError> {
        self.ensure_open()?;
        let mut guard = self.requests.lock();
        guard.send(codec::dump_request(kind), codec::DUMP_FLAGS)?;
        let deadline = Instant::now() + REPLY_TIMEOUT;
        let mut batch = Vec::new();
        loop {
            let datagram = recv_datagram(&guard.socket, &self.closed, Some(deadline))?;
            for reply in codec::parse_replies(&datagram)? {
                match reply {
                    Reply::Event(event) => batch.push(event),
                    Reply::Done => return Ok(batch),
                    Reply::Error(code) => {
                        return Err(ChannelError::netlink(code, errno_message(code)))
                    }
                    Reply::Ack | Reply::Ignored => {}
                }
            }
        }
    }

    fn submit(&self, request: &RtnlRequest) -> Result<(), ChannelError> {
        self.ensure_open()?;
        let (msg, flags) = codec::request_parts(request)?;
        let mut guard = self.requests.lock();
        guard.send(msg, flags)?;
        let deadline = Instant::now() + REPLY_TIMEOUT;
        loop {
            let datagram = recv_datagram(&guard.socket, &self.closed, Some(deadline))?;
            for reply in codec::parse_replies(&datagram)? {
                match reply {
                    Reply::Ack => return Ok(()),
                    Reply::Error(code) => {
                        return Err(ChannelError::netlink(code, errno_message(code)))
                    }
                    Reply::Event(_) | Reply::Done | Reply::Ignored => {}
                }
            }
        }
    }

    fn recv(&self) -> Result<EventBatch, ChannelError> {
        let events = self.events.lock();
        loop {
            let datagram = recv_datagram(&events, &self.closed, None)?;
            // Malformed traffic is a protocol error: drop the datagram and
            // keep the source alive.
            let replies = match codec::parse_replies(&datagram) {
                Ok(replies) => replies,
                Err(e) => {
                    warn!(error = %e, "dropping undecodable event datagram");
                    continue;
                }
            };
            let batch: EventBatch = replies
                .into_iter()
                .filter_map(|reply| match reply {
                    Reply::Event(event) => Some(event),
                    _ => None,
                })
                .collect();
            if !batch.is_empty() {
                return Ok(batch);
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Channels speaking to the kernel of the calling process.
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn connect(&self, _options: &TransportOptions) -> Result<Arc<dyn RtnlChannel>, ChannelError> {
        Ok(Arc::new(NetlinkChannel::new()?))
    }
}
