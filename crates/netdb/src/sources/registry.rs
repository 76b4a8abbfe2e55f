// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sources registry: add/remove/restart sources and persist their
//! descriptors in the store.

use std::sync::Arc;

use serde_json::json;

use netdb_core::{ControlEvent, Error, Target, Value};
use netdb_rtnl::TransportOptions;

use crate::report::Report;
use crate::store::SourceRow;
use crate::NdbInner;

use super::{Source, SourceState, DRAIN_TIMEOUT};

/// Declarative description of one source.
///
/// Shorthand forms translate during normalization:
/// `netns("x")` becomes `{kind: netns, target: x, netns: x}` and
/// `remote("h")` becomes `{kind: remote, target: h, hostname: h,
/// protocol: ssh}`.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    target: Option<Target>,
    kind: Option<String>,
    persistent: bool,
    options: TransportOptions,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self { target: None, kind: None, persistent: true, options: TransportOptions::new() }
    }
}

impl SourceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// The host kernel, labelled `localhost`.
    pub fn local() -> Self {
        Self::new().kind("local").target(Target::localhost())
    }

    /// A named network namespace.
    pub fn netns(name: &str) -> Self {
        Self::new().option("netns", json!(name))
    }

    /// A remote host (requires a registered `remote` transport).
    pub fn remote(hostname: &str) -> Self {
        Self::new().option("hostname", json!(hostname))
    }

    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    /// Non-persistent sources stop instead of reconnecting after a
    /// transient failure.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    pub(crate) fn normalize(self) -> NormalizedSpec {
        let mut options = self.options;
        let mut kind = self.kind;
        let mut target = self.target;
        if let Some(netns) = options.get("netns").and_then(Value::as_str).map(str::to_string) {
            kind.get_or_insert_with(|| "netns".to_string());
            target.get_or_insert_with(|| Target::new(&netns));
        } else if let Some(host) =
            options.get("hostname").and_then(Value::as_str).map(str::to_string)
        {
            kind.get_or_insert_with(|| "remote".to_string());
            target.get_or_insert_with(|| Target::new(&host));
            options.entry("protocol".to_string()).or_insert_with(|| json!("ssh"));
        }
        NormalizedSpec {
            target: target.unwrap_or_default(),
            kind: kind.unwrap_or_else(|| "local".to_string()),
            persistent: self.persistent,
            options,
        }
    }
}

/// A spec with every default and shorthand resolved.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedSpec {
    pub target: Target,
    pub kind: String,
    pub persistent: bool,
    pub options: TransportOptions,
}

/// Instantiate, persist, start, and await one source.
pub(crate) fn add_source(inner: &Arc<NdbInner>, spec: SourceSpec) -> Result<(), Error> {
    inner.ensure_alive()?;
    let spec = spec.normalize();
    let transport = inner
        .options
        .transport_for(&spec.kind)
        .ok_or_else(|| Error::UnsupportedTransport(spec.kind.clone()))?;

    let source = Source::new(
        spec.target.clone(),
        spec.kind.clone(),
        spec.options.clone(),
        spec.persistent,
        inner.options.source_fail_pause,
        transport,
        inner.evq.clone(),
        Arc::clone(&inner.store),
    );

    {
        let mut sources = inner.sources.lock();
        if sources.contains_key(&spec.target) {
            return Err(Error::SourceExists(spec.target));
        }
        sources.insert(spec.target.clone(), Arc::clone(&source));
    }

    // Persist the descriptor before any of the source's own events.
    inner.evq.control(
        &spec.target,
        ControlEvent::SourceAdded { kind: spec.kind.clone(), options: spec.options.clone() },
    );

    if let Err(e) = source.start() {
        inner.sources.lock().remove(&spec.target);
        inner.evq.control(&spec.target, ControlEvent::SourceRemoved);
        return Err(e);
    }

    let timeout = inner.options.source_ready_timeout;
    if !source.ready_point().wait(timeout) {
        if spec.persistent {
            // Keep it registered: it will keep reconnecting.
            return Err(Error::Timeout(timeout));
        }
        source.close(false);
        inner.sources.lock().remove(&spec.target);
        inner.evq.control(&spec.target, ControlEvent::SourceRemoved);
        return Err(Error::Timeout(timeout));
    }
    Ok(())
}

/// The sources view: registry operations plus the persisted descriptors.
pub struct Sources {
    pub(crate) inner: Arc<NdbInner>,
}

impl Sources {
    /// Add and start a source; blocks until its initial load has been
    /// consumed or the ready timeout elapses.
    pub fn add(&self, spec: SourceSpec) -> Result<(), Error> {
        add_source(&self.inner, spec)
    }

    /// Close a source. With `flush`, its rows leave every table.
    pub fn remove(&self, target: impl Into<Target>, flush: bool) -> Result<(), Error> {
        let target = target.into();
        let source = self
            .inner
            .sources
            .lock()
            .remove(&target)
            .ok_or_else(|| Error::NoSource(target.clone()))?;
        source.close(flush);
        self.inner.evq.control(&target, ControlEvent::SourceRemoved);
        self.inner.evq.drain(&target, DRAIN_TIMEOUT);
        Ok(())
    }

    /// Restart a source, whatever state it is in.
    pub fn restart(&self, target: impl Into<Target>, reason: &str) -> Result<(), Error> {
        let target = target.into();
        let source = self.inner.source(&target)?;
        source.restart(reason)
    }

    pub fn state(&self, target: impl Into<Target>) -> Option<SourceState> {
        self.inner.sources.lock().get(&target.into()).map(|s| s.state())
    }

    pub fn targets(&self) -> Vec<Target> {
        self.inner.sources.lock().keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.inner.sources.lock().len()
    }

    /// The persisted descriptor (`sources` + `sources_options` rows).
    pub fn descriptor(&self, target: impl Into<Target>) -> Result<Option<SourceRow>, Error> {
        let store = self.inner.read_store()?;
        Ok(store.sources.get(&target.into()).cloned())
    }

    pub fn summary(&self) -> Result<Report, Error> {
        self.inner.ensure_alive()?;
        let header = vec!["target".to_string(), "kind".to_string(), "state".to_string()];
        let mut report = Report::new(header, self.inner.options.max_report_lines);
        for (target, source) in self.inner.sources.lock().iter() {
            report.push(vec![
                json!(target.as_str()),
                json!(source.kind()),
                json!(source.state().to_string()),
            ]);
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
