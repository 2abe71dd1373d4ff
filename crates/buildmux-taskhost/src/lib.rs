//! Out-of-process task host client: process lifecycle and callback
//! correlation for tasks that opt out of in-process execution.
//!
//! This crate covers the two concerns spec'd for the task host boundary:
//! spawning and reaping the external process per `(runtime, architecture)`
//! ([`host::TaskHostPool`]), and matching a task's coordinator callback to
//! its eventual response ([`callback::PendingCallbacks`]).  Serializing the
//! packets that flow across that boundary is `buildmux-proto`'s job, not
//! this crate's.

pub mod callback;
pub mod error;
pub mod host;

pub use callback::{CallbackGate, PendingCallbacks, RequestIdGenerator};
pub use error::{Error, Result};
pub use host::{HostKey, TaskHostPool, DEFAULT_EXIT_GRACE};
