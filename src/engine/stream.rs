// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::OverflowPolicy;
use crate::engine::lock;
use crate::engine::scheduler::RunState;
use crate::engine::topology::{Consumer, StreamProducer, StreamSpec};
use crate::packet::{Packet, PayloadType, Timestamp};

/// Why a packet could not be placed on a stream. Callers translate this into
/// a node error or a usage error depending on who was sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SendError {
    Closed,
    InvalidTimestamp(Timestamp),
    OutOfOrder { timestamp: Timestamp, bound: Timestamp },
    Overflow { capacity: usize },
    Cancelled,
}

#[derive(Debug)]
struct StreamState {
    /// Lowest timestamp a future packet may carry.
    bound: Timestamp,
    closed: bool,
    pollers: Vec<UnboundedSender<Packet>>,
}

/// Producer side of one stream during one run.
///
/// The stream lock serializes sends, bound updates and closing, so every
/// consumer queue sees packets in producer order. Packets are queued per
/// consumer; the stream itself keeps none.
#[derive(Debug)]
pub(crate) struct StreamRuntime {
    pub name: String,
    pub payload_type: PayloadType,
    pub producer: StreamProducer,
    pub consumers: Vec<Consumer>,
    pub capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    state: Mutex<StreamState>,
    full_consumers: AtomicUsize,
}

impl StreamRuntime {
    pub fn new(spec: &StreamSpec, pollers: Vec<UnboundedSender<Packet>>) -> Self {
        Self {
            name: spec.name.clone(),
            payload_type: spec.payload_type.clone(),
            producer: spec.producer,
            consumers: spec.consumers.clone(),
            capacity: spec.capacity,
            overflow_policy: spec.overflow_policy,
            state: Mutex::new(StreamState {
                bound: Timestamp::UNSTARTED,
                closed: false,
                pollers,
            }),
            full_consumers: AtomicUsize::new(0),
        }
    }

    /// Places `packet` on every consumer queue and every poller.
    ///
    /// Host-fed streams require strictly increasing timestamps, so their bound
    /// moves past the packet. Node-fed streams accept equal timestamps; the
    /// producer's bound propagation settles them once the invocation ends.
    pub fn send(&self, run: &RunState, packet: Packet, strictly_increasing: bool) -> Result<(), SendError> {
        if run.is_cancelled() {
            return Err(SendError::Cancelled);
        }

        let timestamp = packet.timestamp();
        if !timestamp.is_allowed_in_stream() {
            return Err(SendError::InvalidTimestamp(timestamp));
        }

        let mut state = lock(&self.state);
        if state.closed {
            return Err(SendError::Closed);
        }
        if timestamp < state.bound {
            return Err(SendError::OutOfOrder {
                timestamp,
                bound: state.bound,
            });
        }

        state.bound = if strictly_increasing {
            timestamp.next_allowed_in_stream()
        } else {
            timestamp
        };
        let bound = state.bound;

        for consumer in &self.consumers {
            run.nodes[consumer.node].enqueue(run, self, consumer.input, packet.clone(), bound)?;
        }
        state.pollers.retain(|poller| poller.send(packet.clone()).is_ok());
        Ok(())
    }

    /// Announces that no packet below `bound` will follow.
    pub fn advance_bound(&self, run: &RunState, bound: Timestamp) {
        let mut state = lock(&self.state);
        if state.closed || bound <= state.bound {
            return;
        }
        state.bound = bound;
        for consumer in &self.consumers {
            run.nodes[consumer.node].advance_input_bound(run, consumer.input, bound);
        }
    }

    /// Marks the stream `Done`. Returns false if it was already closed.
    pub fn close(&self, run: &RunState) -> bool {
        let mut state = lock(&self.state);
        if state.closed {
            return false;
        }
        state.closed = true;
        state.bound = Timestamp::DONE;
        state.pollers.clear();
        for consumer in &self.consumers {
            run.nodes[consumer.node].advance_input_bound(run, consumer.input, Timestamp::DONE);
        }
        true
    }

    /// A consumer queue became full.
    pub fn consumer_filled(&self) {
        self.full_consumers.fetch_add(1, Ordering::SeqCst);
    }

    /// A full consumer queue drained a packet; the producer may run again.
    pub fn consumer_drained(&self, run: &RunState) {
        self.full_consumers.fetch_sub(1, Ordering::SeqCst);
        if let StreamProducer::Node(producer) = self.producer {
            run.schedule(producer);
        }
    }

    /// Producers are held back while a consumer queue is full, so that
    /// worker threads are not parked in a blocking send.
    pub fn is_throttled(&self) -> bool {
        self.overflow_policy == OverflowPolicy::Block && self.full_consumers.load(Ordering::SeqCst) > 0
    }
}
