// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic the engine emits goes through a message struct with a
//! `Display` implementation and a [`messages::StructuredLog`] implementation,
//! so the wording of an event lives in exactly one place and its fields are
//! recorded as structured `tracing` fields.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - graph, run and executor lifecycle events
//! * `messages::node` - node open/process/close events
//! * `messages::validation` - graph description validation outcomes
//!
//! # Usage
//!
//! ```rust
//! use streamgraph::observability::messages::engine::RunCancelled;
//! use streamgraph::observability::messages::StructuredLog;
//!
//! RunCancelled { run_id: 3 }.log();
//! ```

pub mod messages;
