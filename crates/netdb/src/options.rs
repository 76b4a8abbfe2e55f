// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database configuration.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use netdb_rtnl::Transport;

use crate::sources::SourceSpec;

/// Tunables for one database instance.
///
/// The default configuration connects a single persistent `localhost`
/// source over the real netlink transport.
#[derive(Clone)]
pub struct Options {
    /// How long `commit()` and `View::wait()` wait for a confirming event.
    pub rtnl_timeout: Duration,
    /// How long readers wait on the schema read gate.
    pub read_timeout: Duration,
    /// How long `sources.add()` blocks for the initial load.
    pub source_ready_timeout: Duration,
    /// Pause before a persistent source reconnects after a failure.
    pub source_fail_pause: Duration,
    /// Printable row cap for reports.
    pub max_report_lines: usize,
    pub(crate) sources: Vec<SourceSpec>,
    pub(crate) transports: BTreeMap<String, Arc<dyn Transport>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rtnl_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            source_ready_timeout: Duration::from_secs(30),
            source_fail_pause: Duration::from_secs(5),
            max_report_lines: crate::report::MAX_REPORT_LINES,
            sources: vec![SourceSpec::local()],
            transports: default_transports(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the implicit `localhost` source; only explicitly added
    /// sources will be connected.
    pub fn no_default_sources(mut self) -> Self {
        self.sources.clear();
        self
    }

    /// Add a source to connect during `Netdb::open`.
    pub fn source(mut self, spec: SourceSpec) -> Self {
        self.sources.push(spec);
        self
    }

    /// Register (or replace) the transport for one source kind.
    pub fn transport(mut self, kind: &str, transport: Arc<dyn Transport>) -> Self {
        self.transports.insert(kind.to_string(), transport);
        self
    }

    pub fn rtnl_timeout(mut self, timeout: Duration) -> Self {
        self.rtnl_timeout = timeout;
        self
    }

    pub fn source_fail_pause(mut self, pause: Duration) -> Self {
        self.source_fail_pause = pause;
        self
    }

    pub(crate) fn transport_for(&self, kind: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(kind).cloned()
    }
}

#[cfg(target_os = "linux")]
fn default_transports() -> BTreeMap<String, Arc<dyn Transport>> {
    let mut transports: BTreeMap<String, Arc<dyn Transport>> = BTreeMap::new();
    transports.insert("local".to_string(), Arc::new(netdb_rtnl::LocalTransport));
    transports.insert("netns".to_string(), Arc::new(netdb_rtnl::NetnsTransport));
    transports
}

#[cfg(not(target_os = "linux"))]
fn default_transports() -> BTreeMap<String, Arc<dyn Transport>> {
    BTreeMap::new()
}
