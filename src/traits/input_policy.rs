// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pluggable readiness decision for a node's inputs.

use serde::Deserialize;

use crate::packet::Timestamp;

/// Snapshot of one input queue handed to an [`InputPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    /// Timestamp of the oldest queued packet, if any.
    pub head: Option<Timestamp>,
    /// Lowest timestamp a packet not yet queued could carry.
    pub bound: Timestamp,
    /// Input closes a sanctioned cycle; it never blocks readiness.
    pub back_edge: bool,
}

impl InputState {
    /// Head timestamp if a packet is queued, bound otherwise.
    pub fn min_timestamp(&self) -> Timestamp {
        self.head.unwrap_or(self.bound)
    }

    /// No packet is queued and none will arrive.
    pub fn is_exhausted(&self) -> bool {
        self.head.is_none() && self.bound == Timestamp::DONE
    }
}

/// Outcome of a readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Wait for more packets or bound updates.
    NotReady,
    /// Invoke at `timestamp`, popping the head packet of each input in `take`.
    Ready { timestamp: Timestamp, take: Vec<usize> },
    /// Every input is exhausted; the node can be closed.
    Done,
}

/// Decides, from the state of every input, whether a node may run.
pub trait InputPolicy: Send + Sync {
    fn readiness(&self, inputs: &[InputState]) -> Readiness;

    fn name(&self) -> &'static str;
}

/// Built-in policies selectable from a graph description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPolicyKind {
    /// Run once per settled timestamp across all inputs.
    #[default]
    Synchronized,
    /// Run once per arriving packet on any input.
    Immediate,
}
