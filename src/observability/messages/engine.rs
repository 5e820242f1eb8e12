// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph, run and executor lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Graph initialization
//! * Run start, completion, failure and cancellation
//! * Executor thread pools
//! * Graph input streams and queue overflow

use crate::errors::GraphError;
use crate::observability::messages::StructuredLog;
use crate::packet::Timestamp;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Graph description validated and topology fixed.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use streamgraph::observability::messages::engine::GraphInitialized;
///
/// let msg = GraphInitialized {
///     node_count: 4,
///     stream_count: 6,
///     executor_count: 2,
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Graph initialized: 4 nodes, 6 streams, 2 executors"
/// );
/// ```
pub struct GraphInitialized {
    pub node_count: usize,
    pub stream_count: usize,
    pub executor_count: usize,
}

impl Display for GraphInitialized {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph initialized: {} nodes, {} streams, {} executors",
            self.node_count, self.stream_count, self.executor_count
        )
    }
}

impl StructuredLog for GraphInitialized {
    fn log(&self) {
        tracing::info!(
            node_count = self.node_count,
            stream_count = self.stream_count,
            executor_count = self.executor_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph",
            span_name = name,
            node_count = self.node_count,
            stream_count = self.stream_count,
            executor_count = self.executor_count,
        )
    }
}

/// A run started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunStarted {
    pub run_id: u64,
    pub node_count: usize,
    pub side_packet_count: usize,
}

impl Display for RunStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run {} started: {} nodes, {} side packets",
            self.run_id, self.node_count, self.side_packet_count
        )
    }
}

impl StructuredLog for RunStarted {
    fn log(&self) {
        tracing::info!(
            run_id = self.run_id,
            node_count = self.node_count,
            side_packet_count = self.side_packet_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run",
            span_name = name,
            run_id = self.run_id,
            node_count = self.node_count,
        )
    }
}

/// Every node of a run is closed.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use streamgraph::observability::messages::engine::RunCompleted;
/// use std::time::Duration;
///
/// let msg = RunCompleted {
///     run_id: 1,
///     node_count: 3,
///     duration: Duration::from_millis(42),
///     failed: false,
/// };
///
/// assert_eq!(msg.to_string(), "Run 1 done: 3 nodes closed in 42ms");
/// ```
pub struct RunCompleted {
    pub run_id: u64,
    pub node_count: usize,
    pub duration: Duration,
    pub failed: bool,
}

impl Display for RunCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Run {} done: {} nodes closed in {:?}",
            self.run_id, self.node_count, self.duration
        )?;
        if self.failed {
            write!(f, " (failed)")?;
        }
        Ok(())
    }
}

impl StructuredLog for RunCompleted {
    fn log(&self) {
        tracing::info!(
            run_id = self.run_id,
            node_count = self.node_count,
            duration_ms = self.duration.as_millis() as u64,
            failed = self.failed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run",
            span_name = name,
            run_id = self.run_id,
            duration_ms = self.duration.as_millis() as u64,
        )
    }
}

/// A run failed. Only the first failure becomes the run's status; later ones
/// are logged with `first = false`.
///
/// # Log Level
/// `error!` for the first failure, `debug!` for the rest
pub struct RunFailed<'a> {
    pub run_id: u64,
    pub error: &'a GraphError,
    pub first: bool,
}

impl Display for RunFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.first {
            write!(f, "Run {} failed: {}", self.run_id, self.error)
        } else {
            write!(f, "Run {} already failed, ignoring: {}", self.run_id, self.error)
        }
    }
}

impl StructuredLog for RunFailed<'_> {
    fn log(&self) {
        let node_id = self.error.node_id().unwrap_or_default();
        if self.first {
            tracing::error!(
                run_id = self.run_id,
                node_id = node_id,
                error = %self.error,
                "{}", self
            );
        } else {
            tracing::debug!(
                run_id = self.run_id,
                node_id = node_id,
                error = %self.error,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "run_failed",
            span_name = name,
            run_id = self.run_id,
            error = %self.error,
        )
    }
}

/// A run is being torn down, after a failure or by the host.
///
/// # Log Level
/// `error!` - Run aborted
pub struct RunCancelled {
    pub run_id: u64,
}

impl Display for RunCancelled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Run {} cancelled", self.run_id)
    }
}

impl StructuredLog for RunCancelled {
    fn log(&self) {
        tracing::error!(run_id = self.run_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("run_cancelled", span_name = name, run_id = self.run_id)
    }
}

/// The host closed a graph input stream.
///
/// # Log Level
/// `debug!` - Detailed execution flow
pub struct InputStreamClosed<'a> {
    pub run_id: u64,
    pub stream: &'a str,
}

impl Display for InputStreamClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Input stream '{}' closed", self.stream)
    }
}

impl StructuredLog for InputStreamClosed<'_> {
    fn log(&self) {
        tracing::debug!(run_id = self.run_id, stream = self.stream, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "input_stream",
            span_name = name,
            run_id = self.run_id,
            stream = self.stream,
        )
    }
}

/// A full queue under the `drop_oldest` policy evicted a packet.
///
/// # Log Level
/// `warn!` - Data loss the graph author opted into
///
/// # Example
/// ```
/// use streamgraph::observability::messages::engine::PacketDropped;
/// use streamgraph::packet::Timestamp;
///
/// let msg = PacketDropped {
///     stream: "frames",
///     node_id: "detector",
///     timestamp: Timestamp::new(7),
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct PacketDropped<'a> {
    pub stream: &'a str,
    pub node_id: &'a str,
    pub timestamp: Timestamp,
}

impl Display for PacketDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropped packet at {} on '{}' for node '{}': queue full",
            self.timestamp, self.stream, self.node_id
        )
    }
}

impl StructuredLog for PacketDropped<'_> {
    fn log(&self) {
        tracing::warn!(
            stream = self.stream,
            node_id = self.node_id,
            timestamp = %self.timestamp,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "packet_dropped",
            span_name = name,
            stream = self.stream,
            node_id = self.node_id,
        )
    }
}

/// An executor's worker threads are running.
///
/// # Log Level
/// `debug!` - Detailed execution flow
pub struct ExecutorStarted<'a> {
    pub executor: &'a str,
    pub num_threads: usize,
}

impl Display for ExecutorStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Executor '{}' started with {} threads",
            self.executor, self.num_threads
        )
    }
}

impl StructuredLog for ExecutorStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            executor = self.executor,
            num_threads = self.num_threads,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "executor",
            span_name = name,
            executor = self.executor,
            num_threads = self.num_threads,
        )
    }
}

pub struct ExecutorStopped<'a> {
    pub executor: &'a str,
}

impl Display for ExecutorStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Executor '{}' stopped", self.executor)
    }
}

impl StructuredLog for ExecutorStopped<'_> {
    fn log(&self) {
        tracing::debug!(executor = self.executor, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("executor", span_name = name, executor = self.executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::UsageError;

    #[test]
    fn test_run_failed_wording() {
        let error = GraphError::from(UsageError::SourceNodesPresent);
        let first = RunFailed {
            run_id: 2,
            error: &error,
            first: true,
        };
        let later = RunFailed {
            run_id: 2,
            error: &error,
            first: false,
        };

        assert!(first.to_string().starts_with("Run 2 failed: "));
        assert!(later.to_string().starts_with("Run 2 already failed, ignoring: "));
    }

    #[test]
    fn test_run_completed_marks_failure() {
        let msg = RunCompleted {
            run_id: 5,
            node_count: 0,
            duration: Duration::from_millis(3),
            failed: true,
        };
        assert_eq!(msg.to_string(), "Run 5 done: 0 nodes closed in 3ms (failed)");
    }
}
