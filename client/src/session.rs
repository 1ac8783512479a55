//! # Client Session
//!
//! `ClientSession` owns the full lifecycle of one connection to the external
//! engine: construct, subscribe to head changes, poll the height, tear down.
//! It also maintains everything a presentation layer needs to render that
//! connection, exposed as an immutable snapshot.
//!
//! ## Lifecycle
//!
//! ```text
//! new() -> start() -> subscribe_head_changes() -> spawn_height_poller()
//!                                   │
//!                                stop()
//! ```
//!
//! Status moves forward only: `Initializing → Loading → {Connected, Error}`.
//! There is no reconnect — `Error` is terminal for the session instance, and
//! retrying means creating a fresh session.
//!
//! ## The ghost problem
//!
//! Teardown can race an in-flight `connect` or poll. The session carries a
//! `stopped` flag that is checked after every suspension point: a handle
//! that resolves after `stop()` is disconnected on the spot instead of
//! stored, and a late poll result or head event is discarded. Nothing that
//! arrives after teardown is allowed to touch the read model.
//!
//! ## Ownership
//!
//! The engine handle lives outside the read model, behind the session's own
//! locks, and is never aliased elsewhere. Exactly one handle and at most one
//! listener exist per session lifetime; the listener is always removed
//! before the handle is released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ClientConfiguration;
use crate::engine::{EngineConnector, EngineHandle, HeadEvent, ListenerId};
use crate::error::SessionError;

/// Broadcast capacity for live head-change streaming. Large enough to
/// absorb a rebranch burst without dropping records for slow consumers.
const HEAD_CHANGE_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a client session.
///
/// Transitions are forward-only; an attempted regression is ignored. A new
/// session restarts at `Initializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Session object exists, engine not yet requested.
    Initializing,
    /// Engine construction is in flight.
    Loading,
    /// Engine is up and the session is live. No further automatic
    /// transition — there is no reconnect logic by design.
    Connected,
    /// Engine construction or subscription failed. Terminal.
    Error,
}

impl Status {
    /// Position in the forward-only ordering.
    fn rank(self) -> u8 {
        match self {
            Status::Initializing => 0,
            Status::Loading => 1,
            Status::Connected => 2,
            Status::Error => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Read model
// ---------------------------------------------------------------------------

/// One head-change notification, stamped at observation time. Immutable
/// once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadChangeRecord {
    /// Hash of the new head block.
    pub hash: String,
    /// Engine-supplied reason for the change.
    pub reason: String,
    /// Blocks removed from the best chain, oldest first.
    pub reverted_block_hashes: Vec<String>,
    /// Blocks added to the best chain, oldest first.
    pub adopted_block_hashes: Vec<String>,
    /// When this session observed the event.
    pub observed_at: DateTime<Utc>,
}

/// Read-only view of a session, safe to hand to any renderer.
///
/// Produced by [`ClientSession::snapshot`]; holds no locks and no engine
/// resources. No write operations are exposed outward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    /// Current lifecycle status.
    pub status: Status,
    /// Message of the initialization/subscription failure, if any. One
    /// slot by design — the internal taxonomy stays in [`SessionError`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Recent head changes, most recent first, bounded by the configured
    /// capacity.
    pub head_changes: Vec<HeadChangeRecord>,
    /// Last successfully polled block height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_height: Option<u64>,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the session, its head-change callback, and its
/// poller task. Everything here is cheap to lock and never held across
/// an await.
struct SessionState {
    status: RwLock<Status>,
    error_message: RwLock<Option<String>>,
    recent: Mutex<VecDeque<HeadChangeRecord>>,
    current_height: RwLock<Option<u64>>,
    stopped: AtomicBool,
    recent_capacity: usize,
}

impl SessionState {
    /// Moves the status forward. Regressions are ignored — once `Error`,
    /// always `Error`.
    fn advance(&self, next: Status) {
        let mut status = self.status.write();
        if next.rank() > status.rank() {
            debug!(from = ?*status, to = ?next, "session status advanced");
            *status = next;
        } else if next != *status {
            debug!(from = ?*status, refused = ?next, "ignoring status regression");
        }
    }

    fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Records a surfaced failure: verbatim message into the single error
    /// slot, status to `Error`.
    fn record_failure(&self, message: &str) {
        *self.error_message.write() = Some(message.to_string());
        self.advance(Status::Error);
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// Manages one connection to the external engine and the data needed to
/// render it.
///
/// All methods take `&self`; the session is designed to sit behind an
/// `Arc` shared between the API layer (reads via [`snapshot`]) and the
/// runtime that drives its lifecycle.
///
/// [`snapshot`]: ClientSession::snapshot
pub struct ClientSession {
    connector: Arc<dyn EngineConnector>,
    config: ClientConfiguration,
    state: Arc<SessionState>,
    /// The engine handle. Exclusively owned here, never aliased outside
    /// the session's own tasks. `None` before start and after stop.
    handle: tokio::sync::Mutex<Option<Arc<dyn EngineHandle>>>,
    /// Outstanding listener registration, if any. Removed before the
    /// handle is released.
    listener: tokio::sync::Mutex<Option<ListenerId>>,
    /// Height poller task, aborted on stop.
    poller: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    /// Live feed of head-change records for push consumers.
    events: broadcast::Sender<HeadChangeRecord>,
}

impl ClientSession {
    /// Creates a session in `Initializing` state. No engine work happens
    /// until [`start`](Self::start).
    pub fn new(connector: Arc<dyn EngineConnector>, config: ClientConfiguration) -> Self {
        let (events, _) = broadcast::channel(HEAD_CHANGE_CHANNEL_CAPACITY);
        let recent_capacity = config.recent_capacity;
        Self {
            connector,
            config,
            state: Arc::new(SessionState {
                status: RwLock::new(Status::Initializing),
                error_message: RwLock::new(None),
                recent: Mutex::new(VecDeque::with_capacity(recent_capacity)),
                current_height: RwLock::new(None),
                stopped: AtomicBool::new(false),
                recent_capacity,
            }),
            handle: tokio::sync::Mutex::new(None),
            listener: tokio::sync::Mutex::new(None),
            poller: tokio::sync::Mutex::new(None),
            events,
        }
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        *self.state.status.read()
    }

    /// Subscribes to the live head-change feed. Receivers see every record
    /// that also lands in the bounded log.
    pub fn subscribe_events(&self) -> broadcast::Receiver<HeadChangeRecord> {
        self.events.subscribe()
    }

    /// Requests engine construction and waits for it to settle.
    ///
    /// Single-shot: only a session still in `Initializing` may start, so
    /// exactly one engine instance exists per session lifetime. On success
    /// the handle is stored and status becomes `Connected`. On failure the
    /// engine's message is recorded verbatim and status becomes `Error`.
    /// If [`stop`](Self::stop) ran while the connect was in flight, a
    /// successfully resolved handle is released immediately and the read
    /// model is left untouched.
    pub async fn start(&self) -> Result<(), SessionError> {
        if self.status() != Status::Initializing {
            // A precondition failure, not an engine failure: the error
            // slot and status are left alone.
            return Err(SessionError::Initialization(
                "session was already started".to_string(),
            ));
        }

        if !self.connector.is_available() {
            let err = SessionError::Initialization(
                "engine is not available in this context".to_string(),
            );
            self.state.record_failure(err.message());
            return Err(err);
        }

        self.state.advance(Status::Loading);

        match self.connector.connect(&self.config).await {
            Ok(handle) => {
                // Check-and-store under the handle mutex: stop() sets the
                // flag before taking this lock, so a handle stored here is
                // guaranteed to be swept by the stop() waiting on it.
                let mut slot = self.handle.lock().await;
                if self.state.stopped() {
                    drop(slot);
                    // Resolved after teardown. Release, don't store.
                    debug!("connect resolved after stop; releasing handle");
                    if let Err(e) = handle.disconnect().await {
                        warn!("{}", SessionError::Teardown(e.message));
                    }
                    return Ok(());
                }
                *slot = Some(handle);
                drop(slot);
                self.state.advance(Status::Connected);
                Ok(())
            }
            Err(e) => {
                if self.state.stopped() {
                    debug!(error = %e, "connect failed after stop; ignoring");
                    return Ok(());
                }
                let err = SessionError::Initialization(e.message);
                self.state.record_failure(err.message());
                Err(err)
            }
        }
    }

    /// Registers the session's head-change listener with the engine.
    ///
    /// Requires `Connected`. At most one listener exists per session
    /// lifetime; calling this again while one is outstanding is an error.
    /// A registration that settles after [`stop`](Self::stop) is rolled
    /// back and reported as a subscription error. A registration failure
    /// collapses into the same error slot as an initialization failure.
    pub async fn subscribe_head_changes(&self) -> Result<ListenerId, SessionError> {
        if self.status() != Status::Connected || self.state.stopped() {
            return Err(SessionError::Subscription(
                "session is not connected".to_string(),
            ));
        }

        let handle = {
            let guard = self.handle.lock().await;
            match guard.as_ref() {
                Some(h) => Arc::clone(h),
                None => {
                    return Err(SessionError::Subscription(
                        "no engine handle present".to_string(),
                    ))
                }
            }
        };

        {
            let listener = self.listener.lock().await;
            if listener.is_some() {
                return Err(SessionError::Subscription(
                    "a head-change listener is already registered".to_string(),
                ));
            }
        }

        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let callback = Box::new(move |event: HeadEvent| {
            if state.stopped() {
                // Delivered after teardown; the record must not be applied.
                return;
            }
            let record = HeadChangeRecord {
                hash: event.hash,
                reason: event.reason,
                reverted_block_hashes: event.reverted_block_hashes,
                adopted_block_hashes: event.adopted_block_hashes,
                observed_at: Utc::now(),
            };
            let mut recent = state.recent.lock();
            recent.push_front(record.clone());
            recent.truncate(state.recent_capacity);
            drop(recent);
            // Nobody listening is fine.
            let _ = events.send(record);
        });

        match handle.add_head_listener(callback).await {
            Ok(id) => {
                // Same discipline as the handle store in start(): check
                // the flag under the lock stop() takes, so the id is
                // either swept by stop() or rolled back here.
                let mut slot = self.listener.lock().await;
                if self.state.stopped() {
                    drop(slot);
                    // Registered after teardown; undo, best effort. The
                    // id is already dead, so the caller gets an error
                    // rather than a token it could never use.
                    if let Err(e) = handle.remove_listener(id).await {
                        warn!("{}", SessionError::Teardown(e.message));
                    }
                    return Err(SessionError::Subscription(
                        "session stopped during listener registration".to_string(),
                    ));
                }
                *slot = Some(id);
                Ok(id)
            }
            Err(e) => {
                let err = SessionError::Subscription(e.message);
                self.state.record_failure(err.message());
                Err(err)
            }
        }
    }

    /// Spawns the periodic height poller.
    ///
    /// Queries `block_number()` immediately and then on every configured
    /// interval tick while the session is live. A failed poll is logged and
    /// the previous known height retained; polling continues on the next
    /// tick. No-op if the session is not connected or a poller is already
    /// running.
    pub async fn spawn_height_poller(&self) {
        if self.status() != Status::Connected || self.state.stopped() {
            return;
        }

        let handle = {
            let guard = self.handle.lock().await;
            match guard.as_ref() {
                Some(h) => Arc::clone(h),
                None => return,
            }
        };

        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return;
        }

        let state = Arc::clone(&self.state);
        let interval = self.config.poll_interval;
        *poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if state.stopped() {
                    break;
                }
                match handle.block_number().await {
                    Ok(height) => {
                        if state.stopped() {
                            // Late result against a stopped session.
                            break;
                        }
                        *state.current_height.write() = Some(height);
                        debug!(height, "height poll");
                    }
                    Err(e) => {
                        warn!("{}", SessionError::Poll(e.message));
                    }
                }
            }
        }));
    }

    /// Tears the session down: aborts the poller, removes the listener if
    /// one is outstanding, then releases the engine handle.
    ///
    /// Idempotent — calling this when nothing is active is a no-op.
    /// Teardown errors are logged, never surfaced, and never prevent the
    /// remaining steps from running. Status is left untouched.
    pub async fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);

        if let Some(task) = self.poller.lock().await.take() {
            task.abort();
        }

        let listener = self.listener.lock().await.take();
        let handle = self.handle.lock().await.take();

        if let Some(handle) = handle {
            if let Some(id) = listener {
                if let Err(e) = handle.remove_listener(id).await {
                    warn!("{}", SessionError::Teardown(e.message));
                }
            }
            if let Err(e) = handle.disconnect().await {
                warn!("{}", SessionError::Teardown(e.message));
            }
            debug!("session stopped, engine handle released");
        }
    }

    /// Produces an immutable snapshot of the read model.
    pub fn snapshot(&self) -> SessionView {
        SessionView {
            status: *self.state.status.read(),
            error_message: self.state.error_message.read().clone(),
            head_changes: self.state.recent.lock().iter().cloned().collect(),
            current_height: *self.state.current_height.read(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
