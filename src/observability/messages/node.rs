// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for node lifecycle and invocation events.

use crate::observability::messages::StructuredLog;
use crate::packet::Timestamp;
use crate::traits::ProcessOutcome;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A node's `open` succeeded and it is now dispatched by its input policy.
pub struct NodeOpened<'a> {
    pub node_id: &'a str,
    pub kind: &'a str,
    pub policy: &'a str,
}

impl Display for NodeOpened<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' ({}) opened with {} policy",
            self.node_id, self.kind, self.policy
        )
    }
}

impl StructuredLog for NodeOpened<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            kind = self.kind,
            policy = self.policy,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node",
            span_name = name,
            node_id = self.node_id,
            kind = self.kind,
        )
    }
}

/// # Log Level
/// `trace!` - One per invocation
pub struct NodeInvocationStarted<'a> {
    pub node_id: &'a str,
    pub timestamp: Timestamp,
}

impl Display for NodeInvocationStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Invoking node '{}' at {}", self.node_id, self.timestamp)
    }
}

impl StructuredLog for NodeInvocationStarted<'_> {
    fn log(&self) {
        tracing::trace!(
            node_id = self.node_id,
            timestamp = %self.timestamp,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node_invocation",
            span_name = name,
            node_id = self.node_id,
            timestamp = %self.timestamp,
        )
    }
}

/// # Log Level
/// `trace!` - One per invocation
pub struct NodeInvocationCompleted<'a> {
    pub node_id: &'a str,
    pub timestamp: Timestamp,
    pub outcome: ProcessOutcome,
    pub duration: Duration,
}

impl Display for NodeInvocationCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' at {} finished with {:?} in {:?}",
            self.node_id, self.timestamp, self.outcome, self.duration
        )
    }
}

impl StructuredLog for NodeInvocationCompleted<'_> {
    fn log(&self) {
        tracing::trace!(
            node_id = self.node_id,
            timestamp = %self.timestamp,
            outcome = ?self.outcome,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node_invocation",
            span_name = name,
            node_id = self.node_id,
            outcome = ?self.outcome,
        )
    }
}

pub struct NodeClosed<'a> {
    pub node_id: &'a str,
    pub invocations: u64,
}

impl Display for NodeClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' closed after {} invocations",
            self.node_id, self.invocations
        )
    }
}

impl StructuredLog for NodeClosed<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            invocations = self.invocations,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node", span_name = name, node_id = self.node_id)
    }
}

pub struct SidePacketSet<'a> {
    pub node_id: &'a str,
    pub side_packet: &'a str,
}

impl Display for SidePacketSet<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' set side packet '{}'",
            self.node_id, self.side_packet
        )
    }
}

impl StructuredLog for SidePacketSet<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            side_packet = self.side_packet,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "side_packet",
            span_name = name,
            node_id = self.node_id,
            side_packet = self.side_packet,
        )
    }
}
