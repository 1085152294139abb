//! # sync-core
//!
//! Pure logic for PeerSync (no I/O, instant tests).
//!
//! This crate implements the state machines and small algorithms behind
//! folder synchronization without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The actual I/O (sockets, folder writes) is performed
//! by `sync-transfer` and `sync-coordinator`, which interpret the actions
//! produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod progress;
pub mod retry;
pub mod state;

pub use progress::ProgressTracker;
pub use retry::RetryPolicy;
pub use state::{LinkEvent, SessionAction, SessionState};
