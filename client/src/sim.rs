//! # Simulated Engine
//!
//! A stand-in for the real light-client engine: it fabricates a chain that
//! grows on a fixed tick, with an occasional rebranch thrown in so the
//! head-change plumbing sees non-trivial events. Used by the monitor binary
//! on devnets and by the integration tests — the session logic cannot tell
//! the difference, which is the point of the trait boundary.
//!
//! The feed is deterministic: block N has hash `{:064x}` of N, and every
//! tenth block arrives as a rebranch that reverts its predecessor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ClientConfiguration;
use crate::engine::{EngineConnector, EngineError, EngineHandle, HeadEvent, HeadListener, ListenerId};

/// Default interval between fabricated blocks.
const DEFAULT_BLOCK_TICK: Duration = Duration::from_secs(1);

/// Every this many blocks, the feed emits a rebranch instead of a plain
/// extension.
const REBRANCH_EVERY: u64 = 10;

/// Deterministic hash for a simulated block.
fn block_hash(height: u64) -> String {
    format!("{:064x}", height)
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Connector producing simulated engine handles.
pub struct SimulatedEngine {
    tick: Duration,
    failure: Option<String>,
    available: bool,
}

impl SimulatedEngine {
    /// A healthy engine producing a block every second.
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_BLOCK_TICK)
    }

    /// A healthy engine with a custom block interval.
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            failure: None,
            available: true,
        }
    }

    /// A connector whose `connect` fails with the given message. For
    /// exercising the error path end to end.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            tick: DEFAULT_BLOCK_TICK,
            failure: Some(message.into()),
            available: true,
        }
    }

    /// A connector that reports the current context cannot host the
    /// engine at all.
    pub fn unavailable() -> Self {
        Self {
            tick: DEFAULT_BLOCK_TICK,
            failure: None,
            available: false,
        }
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineConnector for SimulatedEngine {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn connect(
        &self,
        config: &ClientConfiguration,
    ) -> Result<Arc<dyn EngineHandle>, EngineError> {
        if let Some(message) = &self.failure {
            return Err(EngineError::new(message.clone()));
        }
        debug!(network = %config.network, "simulated engine connecting");
        Ok(SimulatedHandle::spawn(self.tick))
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A live simulated engine instance. Owns the feed task that advances the
/// fabricated chain and notifies listeners.
pub struct SimulatedHandle {
    height: Arc<AtomicU64>,
    listeners: Arc<Mutex<HashMap<u64, HeadListener>>>,
    next_listener: AtomicU64,
    feed: Mutex<Option<JoinHandle<()>>>,
    disconnected: AtomicBool,
}

impl SimulatedHandle {
    fn spawn(tick: Duration) -> Arc<Self> {
        let height = Arc::new(AtomicU64::new(0));
        let listeners: Arc<Mutex<HashMap<u64, HeadListener>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let feed_height = Arc::clone(&height);
        let feed_listeners = Arc::clone(&listeners);
        let feed = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            // The immediate first tick would emit block 0; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let h = feed_height.fetch_add(1, Ordering::SeqCst) + 1;
                let event = if h % REBRANCH_EVERY == 0 && h > 1 {
                    // Pretend the previous head lost a fork race.
                    HeadEvent {
                        hash: block_hash(h),
                        reason: "rebranched".into(),
                        reverted_block_hashes: vec![block_hash(h - 1)],
                        adopted_block_hashes: vec![
                            format!("{:064x}", (h - 1) ^ 0xff),
                            block_hash(h),
                        ],
                    }
                } else {
                    HeadEvent {
                        hash: block_hash(h),
                        reason: "extended".into(),
                        reverted_block_hashes: vec![],
                        adopted_block_hashes: vec![block_hash(h)],
                    }
                };
                for listener in feed_listeners.lock().values() {
                    listener(event.clone());
                }
            }
        });

        Arc::new(Self {
            height,
            listeners,
            next_listener: AtomicU64::new(1),
            feed: Mutex::new(Some(feed)),
            disconnected: AtomicBool::new(false),
        })
    }

    fn ensure_connected(&self) -> Result<(), EngineError> {
        if self.disconnected.load(Ordering::SeqCst) {
            Err(EngineError::new("engine is disconnected"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EngineHandle for SimulatedHandle {
    async fn add_head_listener(&self, listener: HeadListener) -> Result<ListenerId, EngineError> {
        self.ensure_connected()?;
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, listener);
        Ok(ListenerId(id))
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<(), EngineError> {
        self.ensure_connected()?;
        self.listeners.lock().remove(&id.0);
        Ok(())
    }

    async fn block_number(&self) -> Result<u64, EngineError> {
        self.ensure_connected()?;
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn disconnect(&self) -> Result<(), EngineError> {
        // Idempotent: only the first call tears the feed down.
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            if let Some(feed) = self.feed.lock().take() {
                feed.abort();
            }
            self.listeners.lock().clear();
            debug!("simulated engine disconnected");
        }
        Ok(())
    }
}
