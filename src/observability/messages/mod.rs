// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! # Organization
//!
//! * `engine` - graph initialization, runs, executors, input streams
//! * `node` - per-node lifecycle and invocations
//! * `validation` - graph description checks
//!
//! # Usage Pattern
//!
//! ```rust
//! use streamgraph::observability::messages::engine::GraphInitialized;
//!
//! let msg = GraphInitialized {
//!     node_count: 5,
//!     stream_count: 7,
//!     executor_count: 1,
//! };
//!
//! tracing::info!("{}", msg);
//! ```

use tracing::Span;

pub mod engine;
pub mod node;
pub mod validation;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emits the event at the message's level.
    fn log(&self);

    /// A span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
