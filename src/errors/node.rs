// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised inside a node invocation.

use thiserror::Error;

use crate::packet::{PayloadType, Timestamp};

/// Reading a packet as the wrong type, or reading an empty packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("Type mismatch: requested {expected}, packet holds {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Packet is empty (requested {expected})")]
    Empty { expected: &'static str },
}

/// Failure of a node's `open`, `process` or `close`, or misuse of its context.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("No {direction} port named '{port}'")]
    UnknownPort {
        direction: &'static str,
        port: String,
    },

    #[error("Output '{port}' is declared {declared} but was sent {actual}")]
    OutputTypeMismatch {
        port: String,
        declared: PayloadType,
        actual: PayloadType,
    },

    #[error("Packet at {timestamp} on output '{port}' violates bound {bound}")]
    TimestampOutOfOrder {
        port: String,
        timestamp: Timestamp,
        bound: Timestamp,
    },

    #[error("Timestamp {timestamp} is not allowed on a stream")]
    InvalidTimestamp { timestamp: Timestamp },

    #[error("Output '{port}' is already closed")]
    OutputClosed { port: String },

    #[error("Queue of stream '{stream}' is full ({capacity} packets)")]
    QueueOverflow { stream: String, capacity: usize },

    #[error("Side packet '{name}' was already set")]
    SidePacketAlreadySet { name: String },

    #[error("Side packet '{name}' is not available")]
    SidePacketUnavailable { name: String },

    #[error("Run was cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NodeError {
    /// Convenience constructor for node-defined failures.
    pub fn failed(message: impl Into<String>) -> Self {
        NodeError::Failed(message.into())
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
