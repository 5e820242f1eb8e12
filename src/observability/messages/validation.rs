// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph description validation.
//!
//! This module contains message types for logging events related to:
//! * Cyclic dependency detection
//! * Validation failure summaries
//! * Successful topology construction

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Cycle without a declared back edge.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use streamgraph::observability::messages::validation::CyclicDependencyDetected;
///
/// let cycle = vec!["a".to_string(), "b".to_string(), "a".to_string()];
/// let msg = CyclicDependencyDetected { cycle: &cycle };
///
/// assert_eq!(msg.to_string(), "Cyclic dependency detected: a -> b -> a");
/// ```
pub struct CyclicDependencyDetected<'a> {
    pub cycle: &'a [String],
}

impl Display for CyclicDependencyDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cyclic dependency detected: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CyclicDependencyDetected<'_> {
    fn log(&self) {
        tracing::error!(
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
        )
    }
}

/// # Log Level
/// `error!` - Initialize refused the description
pub struct ValidationFailed {
    pub error_count: usize,
}

impl Display for ValidationFailed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph validation failed with {} errors", self.error_count)
    }
}

impl StructuredLog for ValidationFailed {
    fn log(&self) {
        tracing::error!(error_count = self.error_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("validation", span_name = name, error_count = self.error_count)
    }
}

/// # Log Level
/// `debug!` - Detailed flow
pub struct ValidationCompleted {
    pub node_count: usize,
    pub stream_count: usize,
}

impl Display for ValidationCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph validated: {} nodes, {} streams",
            self.node_count, self.stream_count
        )
    }
}

impl StructuredLog for ValidationCompleted {
    fn log(&self) {
        tracing::debug!(
            node_count = self.node_count,
            stream_count = self.stream_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "validation",
            span_name = name,
            node_count = self.node_count,
            stream_count = self.stream_count,
        )
    }
}
