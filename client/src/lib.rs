// Copyright (c) 2026 Headlight Contributors. MIT License.
// See LICENSE for details.

//! # Headlight — Client Session Library
//!
//! Headlight watches a blockchain light client so you don't have to. The
//! actual blockchain work — networking, consensus, peer discovery, block
//! validation — happens inside an external engine that this crate treats as
//! a sealed black box. What lives here is the part that is easy to get
//! wrong anyway: the lifecycle of exactly one connection to that engine,
//! and a read model that is always safe to render.
//!
//! ## Architecture
//!
//! - **engine** — The trait boundary around the external engine: an async
//!   connector, a handle with disconnect/listen/poll operations, and the
//!   head-change event payload. Everything behind it is opaque.
//! - **config** — Network selection and session tuning knobs, builder style.
//! - **session** — `ClientSession`: the forward-only status machine, the
//!   bounded head-change log, the height poller, and teardown that never
//!   throws. This is the whole point of the crate.
//! - **error** — The session error taxonomy. Four categories internally,
//!   one error slot surfaced, on purpose.
//! - **sim** — A simulated engine for devnets and tests, so the session
//!   logic can be exercised without a real chain in the room.
//!
//! ## Design Philosophy
//!
//! 1. One session, one handle, one listener. Counted, not assumed.
//! 2. Teardown is infallible from the caller's point of view.
//! 3. Anything that resolves after `stop()` is a ghost and gets ignored.
//! 4. The read model is a snapshot — renderers never hold our locks.

pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod sim;

pub use config::{ClientConfiguration, Network};
pub use engine::{EngineConnector, EngineError, EngineHandle, HeadEvent, ListenerId};
pub use error::SessionError;
pub use session::{ClientSession, HeadChangeRecord, SessionView, Status};
