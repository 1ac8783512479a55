//! # Session Error Taxonomy
//!
//! Four ways a session can go wrong, kept distinct internally even though
//! the surfaced read model has a single error slot. Initialization and
//! subscription failures are the ones a user sees; poll and teardown
//! failures are recovered locally and only show up in the logs.

/// Errors raised by session operations.
///
/// The variant tells you which phase failed; the payload is the underlying
/// engine message, verbatim.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Engine construction failed (connector refused, transport error,
    /// or the runtime context cannot host the engine).
    #[error("engine initialization failed: {0}")]
    Initialization(String),

    /// Head-change listener registration failed after a successful connect.
    #[error("head-change subscription failed: {0}")]
    Subscription(String),

    /// A periodic height query failed. Recovered locally — the previous
    /// known height is retained and polling continues.
    #[error("height poll failed: {0}")]
    Poll(String),

    /// Unsubscribe or disconnect failed during teardown. Logged, never
    /// surfaced; the session is considered stopped regardless.
    #[error("session teardown failed: {0}")]
    Teardown(String),
}

impl SessionError {
    /// The engine message carried by this error, without the phase prefix.
    pub fn message(&self) -> &str {
        match self {
            SessionError::Initialization(m)
            | SessionError::Subscription(m)
            | SessionError::Poll(m)
            | SessionError::Teardown(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_strips_phase_prefix() {
        let err = SessionError::Initialization("network unreachable".into());
        assert_eq!(err.message(), "network unreachable");
        assert!(err.to_string().contains("initialization"));
    }
}
