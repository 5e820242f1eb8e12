// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

use crate::errors::NodeError;
use crate::packet::Timestamp;

/// Which node operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Open,
    Process,
    Close,
}

impl Display for NodePhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NodePhase::Open => write!(f, "open"),
            NodePhase::Process => write!(f, "process"),
            NodePhase::Close => write!(f, "close"),
        }
    }
}

/// Status of a run, and immediate errors of the driving API.
///
/// Run failures are shared (`Arc`) so that the first failure can be handed to
/// every caller of `wait_until_done` without being consumed.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("Node '{node_id}' failed in {phase} at {timestamp}: {source}")]
    NodeFailure {
        node_id: String,
        phase: NodePhase,
        timestamp: Timestamp,
        #[source]
        source: Arc<NodeError>,
    },

    #[error("Node '{node_id}' closed without setting side packet '{side_packet}'")]
    MissingSidePacket { node_id: String, side_packet: String },

    #[error(transparent)]
    Usage(#[from] UsageError),
}

impl GraphError {
    pub(crate) fn node_failure(
        node_id: &str,
        phase: NodePhase,
        timestamp: Timestamp,
        source: NodeError,
    ) -> Self {
        GraphError::NodeFailure {
            node_id: node_id.to_string(),
            phase,
            timestamp,
            source: Arc::new(source),
        }
    }

    /// Id of the failing node, for node failures.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            GraphError::NodeFailure { node_id, .. } | GraphError::MissingSidePacket { node_id, .. } => {
                Some(node_id)
            }
            GraphError::Usage(_) => None,
        }
    }
}

/// Local misuse of the driving API, reported by the call itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Operation '{operation}' is not valid while the graph is {state}")]
    InvalidState { operation: &'static str, state: String },

    #[error("Unknown graph input stream '{0}'")]
    UnknownInputStream(String),

    #[error("Unknown stream '{0}'")]
    UnknownStream(String),

    #[error("Graph input stream '{0}' is already closed")]
    StreamAlreadyClosed(String),

    #[error("Packet at {timestamp} on '{stream}' is not after bound {bound}")]
    TimestampOutOfOrder {
        stream: String,
        timestamp: Timestamp,
        bound: Timestamp,
    },

    #[error("Timestamp {0} is not allowed on a stream")]
    InvalidTimestamp(Timestamp),

    #[error("Packet of type {actual} does not match stream '{stream}' of type {declared}")]
    TypeMismatch {
        stream: String,
        declared: String,
        actual: String,
    },

    #[error("Input stream '{stream}' is full ({capacity} packets)")]
    QueueFull { stream: String, capacity: usize },

    #[error("Side packet '{0}' is required but was not supplied")]
    MissingSidePacket(String),

    #[error("Side packet '{0}' is not consumed by any node")]
    UnexpectedSidePacket(String),

    #[error("wait_until_idle is not supported on a graph with source nodes")]
    SourceNodesPresent,

    #[error("Output poller for '{0}' must be added before the run starts")]
    PollerAfterStart(String),
}
