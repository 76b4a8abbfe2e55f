// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RTNL event sources: one connection, one reader thread, one small FSM.

mod registry;

pub use registry::{Sources, SourceSpec};

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use netdb_core::{ControlEvent, Error, SyncPoint, Target, DUMP_SEQUENCE};
use netdb_rtnl::{ChannelError, RtnlChannel, Transport, TransportOptions};

use crate::queue::EventSender;
use crate::store::{Gate, StoreHandle};

/// Retry limit for [`Source::api`] while the source restarts underneath.
const API_RETRY_LIMIT: usize = 100;
const API_RETRY_PAUSE: Duration = Duration::from_millis(50);

/// How often a blocked reader rechecks the write gate and shutdown flag.
const GATE_TICK: Duration = Duration::from_millis(100);

/// How long a stopping reader waits for the manager to drain its events.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Source lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Init,
    Connecting,
    Loading,
    Running,
    Failed,
    Stopped,
}

impl std::fmt::Display for SourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceState::Init => "init",
            SourceState::Connecting => "connecting",
            SourceState::Loading => "loading",
            SourceState::Running => "running",
            SourceState::Failed => "failed",
            SourceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// One connection to a kernel endpoint, feeding the event queue.
///
/// The reader thread performs the initial bulk dump behind the read gate,
/// then forwards spontaneous events until the channel closes or fails.
/// Persistent sources self-heal: after a transient failure they sleep and
/// re-enter `Connecting`.
pub(crate) struct Source {
    target: Target,
    kind: String,
    options: TransportOptions,
    persistent: bool,
    fail_pause: Duration,
    transport: Arc<dyn Transport>,
    evq: EventSender,
    store: Arc<StoreHandle>,
    state: Mutex<SourceState>,
    channel: Mutex<Option<Arc<dyn RtnlChannel>>>,
    /// Open means "shutdown requested"; reset (closed) on every start.
    shutdown: Gate,
    ready: Mutex<SyncPoint>,
    thread: Mutex<Option<JoinHandle<()>>>,
    /// Serializes `api()` callers per source.
    api_lock: Mutex<()>,
}

impl Source {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target: Target,
        kind: String,
        options: TransportOptions,
        persistent: bool,
        fail_pause: Duration,
        transport: Arc<dyn Transport>,
        evq: EventSender,
        store: Arc<StoreHandle>,
    ) -> Arc<Self> {
        Arc::new(Self {
            target,
            kind,
            options,
            persistent,
            fail_pause,
            transport,
            evq,
            store,
            state: Mutex::new(SourceState::Init),
            channel: Mutex::new(None),
            shutdown: Gate::new(false),
            ready: Mutex::new(SyncPoint::new()),
            thread: Mutex::new(None),
            api_lock: Mutex::new(()),
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn state(&self) -> SourceState {
        *self.state.lock()
    }

    /// The rendezvous signalled once the current initial load has been
    /// consumed by the manager. Replaced on every start.
    pub fn ready_point(&self) -> SyncPoint {
        self.ready.lock().clone()
    }

    fn set_state(&self, next: SourceState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!(target = %self.target, from = %*state, to = %next, "source state");
            *state = next;
        }
    }

    /// Spawn the reader thread. Errors if the source is already running.
    pub fn start(self: &Arc<Self>) -> Result<(), Error> {
        let mut thread = self.thread.lock();
        if thread.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(Error::InvalidState("source is running".to_string()));
        }
        debug!(target = %self.target, "starting the source");
        self.shutdown.close();
        *self.ready.lock() = SyncPoint::new();
        let source = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(format!("netdb-source-{}", self.target))
            .spawn(move || source.run())
            .map_err(|e| Error::Channel(e.to_string()))?;
        *thread = Some(handle);
        Ok(())
    }

    fn run(self: Arc<Self>) {
        loop {
            if self.shutdown.is_open() {
                self.set_state(SourceState::Stopped);
                return;
            }
            if let Some(stale) = self.channel.lock().take() {
                stale.close();
            }
            self.set_state(SourceState::Connecting);
            let channel = match self.transport.connect(&self.options) {
                Ok(channel) => channel,
                Err(e) => {
                    if self.pause_before_retry(e) {
                        continue;
                    }
                    return;
                }
            };
            *self.channel.lock() = Some(Arc::clone(&channel));

            if let Err(e) = self.load(channel.as_ref()) {
                if self.pause_before_retry(e) {
                    continue;
                }
                return;
            }
            self.set_state(SourceState::Running);

            loop {
                if self.shutdown.is_open() {
                    self.stop_and_drain();
                    return;
                }
                match channel.recv() {
                    Ok(batch) => {
                        // Quiesce point: no new writes enter the queue
                        // while the write gate is closed.
                        while !self.store.write_gate.wait_open(GATE_TICK) {
                            if self.shutdown.is_open() {
                                self.stop_and_drain();
                                return;
                            }
                        }
                        self.evq.send(&self.target, batch);
                    }
                    Err(ChannelError::Closed) => {
                        self.stop_and_drain();
                        return;
                    }
                    Err(e) => {
                        if self.pause_before_retry(e) {
                            break;
                        }
                        return;
                    }
                }
            }
        }
    }

    /// Initial load: close the read gate, flush the target, enqueue one
    /// batch per dump family, reopen the gate, then place the sync marker.
    fn load(&self, channel: &dyn RtnlChannel) -> Result<(), ChannelError> {
        self.set_state(SourceState::Loading);
        channel.bind()?;
        self.store.read_gate.close();
        self.evq.control(&self.target, ControlEvent::Flush);
        let dumps: Result<(), ChannelError> = (|| {
            for kind in DUMP_SEQUENCE {
                let batch = channel.dump(*kind)?;
                self.evq.send(&self.target, batch);
            }
            Ok(())
        })();
        self.store.read_gate.open();
        dumps?;
        self.evq.control(&self.target, ControlEvent::Sync(self.ready_point()));
        Ok(())
    }

    /// Handle a source error. Returns `true` when the caller should
    /// reconnect, `false` when the reader must exit.
    fn pause_before_retry(&self, err: ChannelError) -> bool {
        if self.shutdown.is_open() {
            self.set_state(SourceState::Stopped);
            return false;
        }
        warn!(target = %self.target, error = %err, "source error");
        self.set_state(SourceState::Failed);
        self.evq.control(&self.target, ControlEvent::MarkFailed);
        if !err.is_transient() {
            // Permanent failure: stay failed until someone restarts us.
            return false;
        }
        if !self.persistent {
            self.set_state(SourceState::Stopped);
            return false;
        }
        debug!(target = %self.target, "sleeping before restart");
        if self.shutdown.wait_open(self.fail_pause) {
            self.set_state(SourceState::Stopped);
            return false;
        }
        true
    }

    /// Graceful stop: make sure the manager consumed everything we sent.
    fn stop_and_drain(&self) {
        self.set_state(SourceState::Stopped);
        self.evq.drain(&self.target, DRAIN_TIMEOUT);
    }

    /// Stop the reader and close the channel. With `flush`, drop this
    /// target's rows once the queue has drained.
    pub fn close(&self, flush: bool) {
        debug!(target = %self.target, flush, "stopping the source");
        self.shutdown.open();
        if let Some(channel) = self.channel.lock().clone() {
            channel.close();
        }
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        if flush {
            self.evq.control(&self.target, ControlEvent::Flush);
            self.evq.drain(&self.target, DRAIN_TIMEOUT);
        }
    }

    /// Tear down and reconnect, holding the schema read gate closed for
    /// the duration. Also revives a stopped non-persistent source.
    pub fn restart(self: &Arc<Self>, reason: &str) -> Result<(), Error> {
        info!(target = %self.target, reason, "restarting the source");
        self.evq.control(&self.target, ControlEvent::ReadLock);
        let result = {
            self.close(false);
            self.start()
        };
        self.evq.control(&self.target, ControlEvent::ReadUnlock);
        result
    }

    /// Run one channel operation with bounded retry on transient errors.
    /// Typed kernel errors propagate to the caller as-is; calls are
    /// serialized per source.
    pub fn api<T>(
        &self,
        name: &str,
        op: impl Fn(&dyn RtnlChannel) -> Result<T, ChannelError>,
    ) -> Result<T, Error> {
        let _serialized = self.api_lock.lock();
        for _ in 0..API_RETRY_LIMIT {
            let channel = self.channel.lock().clone();
            match channel {
                Some(channel) => match op(channel.as_ref()) {
                    Ok(value) => return Ok(value),
                    Err(ChannelError::Netlink { code, msg }) => {
                        return Err(Error::Netlink { code, msg })
                    }
                    Err(ChannelError::Unsupported(what)) => {
                        return Err(Error::UnsupportedTransport(what))
                    }
                    Err(ChannelError::Decode(msg)) => return Err(Error::Channel(msg)),
                    Err(e) => {
                        // Probably restarting underneath us.
                        debug!(target = %self.target, api = name, error = %e, "api retry");
                    }
                },
                None => debug!(target = %self.target, api = name, "no channel yet, retrying"),
            }
            std::thread::sleep(API_RETRY_PAUSE);
        }
        Err(Error::Channel(format!("api call {name} did not complete")))
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
