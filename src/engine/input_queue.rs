// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;

use crate::packet::{Packet, Timestamp};
use crate::traits::InputState;

/// Packets waiting on one input port of one consumer, plus the bound of the
/// stream feeding it.
///
/// Each consumer of a stream owns its own queue, so a slow consumer never
/// holds packets back from a fast one.
#[derive(Debug)]
pub(crate) struct InputQueue {
    packets: VecDeque<Packet>,
    bound: Timestamp,
    back_edge: bool,
    capacity: Option<usize>,
}

impl InputQueue {
    pub fn new(capacity: Option<usize>, back_edge: bool) -> Self {
        Self {
            packets: VecDeque::new(),
            bound: Timestamp::UNSTARTED,
            back_edge,
            // a full back edge could only be drained by its own producer
            capacity: if back_edge { None } else { capacity },
        }
    }

    pub fn state(&self) -> InputState {
        InputState {
            head: self.packets.front().map(Packet::timestamp),
            bound: self.bound,
            back_edge: self.back_edge,
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity.map_or(false, |capacity| self.packets.len() >= capacity)
    }

    pub fn bound(&self) -> Timestamp {
        self.bound
    }

    /// Appends a packet; the caller has already applied the overflow policy.
    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    pub fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    /// Raises the bound. Bounds never move backwards.
    pub fn advance_bound(&mut self, bound: Timestamp) {
        if bound > self.bound {
            self.bound = bound;
        }
    }

    /// Drops everything still queued and marks the input exhausted.
    pub fn close(&mut self) {
        self.packets.clear();
        self.bound = Timestamp::DONE;
    }
}
