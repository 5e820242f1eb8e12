// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::packet::PayloadType;

/// Structural problems found while validating a graph description.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Two nodes share the same id
    #[error("Duplicate node ID: '{node_id}'")]
    DuplicateNodeId { node_id: String },

    /// A stream is produced by more than one output (or graph input)
    #[error("Stream '{stream}' has multiple producers: {}", .producers.join(", "))]
    MultipleProducers { stream: String, producers: Vec<String> },

    /// A node consumes a stream that nothing produces
    #[error("Node '{node_id}' consumes stream '{stream}' which is never produced")]
    UnproducedStream { node_id: String, stream: String },

    /// A declared graph output is never produced
    #[error("Graph output stream '{stream}' is never produced")]
    UnproducedGraphOutput { stream: String },

    /// A node consumes a side packet that is neither produced nor a graph side packet
    #[error("Node '{node_id}' requires side packet '{side_packet}' which is never provided")]
    UnprovidedSidePacket { node_id: String, side_packet: String },

    /// A side packet is produced by more than one node, or by a node and the host
    #[error("Side packet '{side_packet}' has multiple producers: {}", .producers.join(", "))]
    MultipleSidePacketProducers {
        side_packet: String,
        producers: Vec<String>,
    },

    /// A node is bound to an executor that was never declared
    #[error("Node '{node_id}' requests executor '{executor}' which is not declared")]
    UnknownExecutor { node_id: String, executor: String },

    /// Two executors share a name, or one reuses the reserved default name
    #[error("Duplicate executor name: '{executor}'")]
    DuplicateExecutor { executor: String },

    /// A node lists a back edge on an input port it does not bind
    #[error("Node '{node_id}' marks '{port}' as a back edge but does not bind that input")]
    InvalidBackEdge { node_id: String, port: String },

    /// A cycle that is not broken by a declared back edge
    #[error("Cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A binding names a port the node contract does not declare
    #[error("Node '{node_id}' has no {direction} port named '{port}'")]
    UnknownPort {
        node_id: String,
        direction: &'static str,
        port: String,
    },

    /// A required port in the node contract is left unbound
    #[error("Node '{node_id}' leaves required {direction} port '{port}' unbound")]
    MissingPort {
        node_id: String,
        direction: &'static str,
        port: String,
    },

    /// Producer and consumer disagree on what travels on a stream
    #[error("Stream '{stream}' carries {produced} but node '{node_id}' expects {consumed}")]
    TypeMismatch {
        stream: String,
        node_id: String,
        produced: PayloadType,
        consumed: PayloadType,
    },

    /// `max_in_flight` or a queue size of zero
    #[error("Invalid setting for '{owner}': {reason}")]
    InvalidSetting { owner: String, reason: String },
}

/// Errors raised by `Graph::initialize`. No partial graph exists after one of these.
#[derive(Debug, Error)]
pub enum GraphConfigError {
    #[error("Failed to read graph description '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse graph description: {0}")]
    Parse(String),

    #[error("Node '{node_id}' has unknown kind '{kind}'")]
    UnknownNodeKind { node_id: String, kind: String },

    #[error("Failed to create node '{node_id}' of kind '{kind}': {reason}")]
    NodeCreation {
        node_id: String,
        kind: String,
        reason: String,
    },

    #[error("Graph validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Graph is already initialized")]
    AlreadyInitialized,
}

impl GraphConfigError {
    /// Validation errors carried by this error, if any.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            GraphConfigError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<Vec<ValidationError>> for GraphConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        GraphConfigError::Validation(errors)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| format!("  - {}", error))
        .collect::<Vec<_>>()
        .join("\n")
}
