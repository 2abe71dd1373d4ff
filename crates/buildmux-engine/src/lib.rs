//! Request builder state machine and multiplexing request engine.
//!
//! This crate owns the part of the build-request scheduling core that sits
//! between the data model (`buildmux-core`) and its two caches
//! (`buildmux-config-cache`, `buildmux-results-cache`): ancestry tracking
//! for circular-dependency detection, node concurrency/backpressure, bounded
//! cooperative cancellation, and the [`engine::RequestEngine`] multiplexer
//! that drives requests through an external [`buildmux_core::TargetBuilder`]
//! and routes sub-request traffic between them.

pub mod cancellation;
pub mod chain;
pub mod engine;
pub mod error;
pub mod ids;
pub mod node;

pub use cancellation::{race_against_cancellation, synthesize_cancelled_result, DEFAULT_CANCELLATION_BOUND};
pub use chain::{ChainLink, RequestChain};
pub use engine::RequestEngine;
pub use error::{Error, Result};
pub use ids::{GlobalRequestIdGenerator, SubmissionIdGenerator};
pub use node::{NodeId, NodePool};
