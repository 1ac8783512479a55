//! # Engine Boundary
//!
//! The external light-client engine does all of the actual blockchain work.
//! This module is the fence around it: two object-safe traits (a connector
//! that produces handles, and the handle itself), the head-change event
//! payload, and the opaque listener token.
//!
//! The traits are deliberately narrow — exactly the operations the session
//! consumes, nothing speculative. The engine manages its own tasks behind
//! the handle; we never see them. Keeping the boundary trait-shaped means
//! the session logic is testable without a real chain, the same way the
//! sync engine in our reference stack keeps transport "the caller's
//! problem".

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A transport or initialization failure reported by the engine.
///
/// The engine is a black box, so all we can faithfully carry is its message.
/// Classification into the session taxonomy happens at the call site that
/// observed the failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    /// Human-readable description, recorded verbatim.
    pub message: String,
}

impl EngineError {
    /// Wraps a message into an engine error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Head-change events
// ---------------------------------------------------------------------------

/// Raw payload of a head-change notification from the engine.
///
/// A head change means the locally tracked best chain tip moved. In the
/// common case `reverted_block_hashes` is empty and `adopted_block_hashes`
/// holds the single new block; during a rebranch both lists are populated,
/// in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadEvent {
    /// Hash of the new head block.
    pub hash: String,
    /// Engine-supplied reason string (e.g. "extended", "rebranched").
    pub reason: String,
    /// Blocks removed from the best chain, oldest first.
    pub reverted_block_hashes: Vec<String>,
    /// Blocks added to the best chain, oldest first.
    pub adopted_block_hashes: Vec<String>,
}

/// Callback invoked by the engine for every head change.
///
/// Sync on purpose: the engine calls it from its own internal tasks, and
/// listeners must not block or suspend in there.
pub type HeadListener = Box<dyn Fn(HeadEvent) + Send + Sync>;

/// Opaque token identifying a registered head listener.
///
/// Required to unsubscribe; invalid after [`EngineHandle::remove_listener`]
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Connector & Handle
// ---------------------------------------------------------------------------

/// Asynchronous factory for engine connections.
///
/// A connector may refuse to run at all in the current context — that is
/// what [`is_available`](EngineConnector::is_available) reports, and it is
/// the explicit gate replacing "only instantiate in an interactive client
/// context" tricks. Callers must check it before attempting `connect`.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Whether the current execution context can host the engine at all.
    ///
    /// Defaults to `true`; connectors with environmental requirements
    /// override this.
    fn is_available(&self) -> bool {
        true
    }

    /// Builds and connects an engine instance for the given configuration.
    ///
    /// Suspends until the engine is connected or fails. On success the
    /// returned handle is live and exclusively owned by the caller.
    async fn connect(
        &self,
        config: &crate::config::ClientConfiguration,
    ) -> Result<Arc<dyn EngineHandle>, EngineError>;
}

/// A live connection to the engine.
///
/// All operations are async and may suspend. After [`disconnect`]
/// (idempotent on the engine side) no further operations are valid; the
/// session enforces that by dropping its handle on teardown.
///
/// [`disconnect`]: EngineHandle::disconnect
#[async_trait]
pub trait EngineHandle: Send + Sync {
    /// Registers a head-change listener. The returned id is required to
    /// unsubscribe later.
    async fn add_head_listener(&self, listener: HeadListener) -> Result<ListenerId, EngineError>;

    /// Removes a previously registered listener. The id is invalid
    /// afterwards.
    async fn remove_listener(&self, id: ListenerId) -> Result<(), EngineError>;

    /// Current block height as tracked by the engine.
    async fn block_number(&self) -> Result<u64, EngineError>;

    /// Releases the connection. Idempotent.
    async fn disconnect(&self) -> Result<(), EngineError>;
}
