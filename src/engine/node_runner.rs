// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-node state machine for one run.
//!
//! A node is `Unopened` until its input side packets resolve, `Active` while
//! it is dispatched by its input policy, and `Closed` once every input is
//! exhausted, it returned [`ProcessOutcome::Stop`], or the run was cancelled.
//!
//! Locks are always taken in the order emission -> stream -> node state, and
//! the node state lock is never held while calling into the node or touching
//! a stream.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::OverflowPolicy;
use crate::engine::context::{Emission, NodeContext};
use crate::engine::input_queue::InputQueue;
use crate::engine::lock;
use crate::engine::scheduler::RunState;
use crate::engine::stream::{SendError, StreamRuntime};
use crate::engine::topology::{InputBinding, NodeSpec, OutputBinding, SideBinding};
use crate::errors::{GraphError, NodeError, NodePhase, NodeResult};
use crate::observability::messages::engine::PacketDropped;
use crate::observability::messages::node::{
    NodeClosed, NodeInvocationCompleted, NodeInvocationStarted, NodeOpened,
};
use crate::observability::messages::StructuredLog;
use crate::packet::{Packet, Timestamp};
use crate::traits::{InputPolicy, Node, NodeContract, ProcessOutcome, Readiness};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unopened,
    Opening,
    Active,
    Closing,
    Closed,
}

struct NodeState {
    lifecycle: Lifecycle,
    inputs: Vec<InputQueue>,
    /// A task for this node sits in its executor queue.
    queued: bool,
    in_flight: usize,
    /// Timestamps of invocations whose outputs are not yet committed.
    pending_timestamps: BTreeMap<u64, Timestamp>,
    next_seq: u64,
    stop_requested: bool,
    invocations: u64,
}

impl NodeState {
    /// Lowest timestamp any future output of this node can carry.
    fn output_floor(&self) -> Timestamp {
        let pending = self.pending_timestamps.values().min().copied();
        let inputs = self
            .inputs
            .iter()
            .map(|queue| queue.state())
            .filter(|state| !state.back_edge)
            .map(|state| state.min_timestamp())
            .min()
            .unwrap_or(Timestamp::DONE);

        // close() may still emit a post-stream packet
        pending
            .map_or(inputs, |pending| pending.min(inputs))
            .min(Timestamp::POST_STREAM)
    }
}

/// Buffered outputs of concurrent invocations, committed in dispatch order.
#[derive(Default)]
struct EmissionState {
    next_commit: u64,
    finished: BTreeMap<u64, (Timestamp, Vec<Emission>)>,
}

pub(crate) struct Invocation {
    seq: u64,
    timestamp: Timestamp,
    inputs: Vec<Packet>,
}

enum Action {
    Nothing,
    Open,
    Invoke(Invocation),
    Close { opened: bool },
}

pub(crate) struct NodeRuntime {
    pub index: usize,
    pub id: String,
    pub kind: String,
    pub node: Arc<dyn Node>,
    pub contract: NodeContract,
    policy: Arc<dyn InputPolicy>,
    pub executor: usize,
    pub max_in_flight: usize,
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<OutputBinding>,
    pub input_side_packets: Vec<SideBinding>,
    pub output_side_packets: Vec<SideBinding>,
    state: Mutex<NodeState>,
    /// Signalled whenever queue space frees up or the run is cancelled.
    space: Condvar,
    emission: Mutex<EmissionState>,
}

impl NodeRuntime {
    pub fn new(
        index: usize,
        spec: &NodeSpec,
        node: Arc<dyn Node>,
        policy: Arc<dyn InputPolicy>,
        capacities: &[Option<usize>],
    ) -> Self {
        let inputs = spec
            .inputs
            .iter()
            .zip(capacities)
            .map(|(binding, capacity)| InputQueue::new(*capacity, binding.back_edge))
            .collect();

        Self {
            index,
            id: spec.id().to_string(),
            kind: spec.config.kind.clone(),
            node,
            contract: spec.contract.clone(),
            policy,
            executor: spec.executor,
            max_in_flight: spec.max_in_flight.max(1),
            inputs: spec.inputs.clone(),
            outputs: spec.outputs.clone(),
            input_side_packets: spec.input_side_packets.clone(),
            output_side_packets: spec.output_side_packets.clone(),
            state: Mutex::new(NodeState {
                lifecycle: Lifecycle::Unopened,
                inputs,
                queued: false,
                in_flight: 0,
                pending_timestamps: BTreeMap::new(),
                next_seq: 0,
                stop_requested: false,
                invocations: 0,
            }),
            space: Condvar::new(),
            emission: Mutex::new(EmissionState::default()),
        }
    }

    pub fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Asks the node to close once its in-flight invocations return.
    pub fn request_stop(&self) {
        self.lock_state().stop_requested = true;
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    fn lock_state(&self) -> MutexGuard<'_, NodeState> {
        lock(&self.state)
    }

    /// Claims the right to queue a task. False if one is already queued or
    /// the node is closed.
    pub fn mark_queued(&self) -> bool {
        let mut state = self.lock_state();
        if state.queued || state.lifecycle == Lifecycle::Closed {
            return false;
        }
        state.queued = true;
        true
    }

    pub fn unmark_queued(&self) {
        self.lock_state().queued = false;
    }

    /// Seeds a back-edge input so the first invocation does not wait on it.
    pub fn seed_back_edges(&self) {
        let mut state = self.lock_state();
        for (binding, queue) in self.inputs.iter().zip(state.inputs.iter_mut()) {
            if binding.back_edge {
                queue.push(Packet::empty().at(Timestamp::PRE_STREAM));
            }
        }
    }

    /// Adds a packet to one input queue, applying the stream's overflow policy.
    pub fn enqueue(
        &self,
        run: &RunState,
        stream: &StreamRuntime,
        input: usize,
        packet: Packet,
        bound: Timestamp,
    ) -> Result<(), SendError> {
        let mut state = self.lock_state();
        loop {
            if state.lifecycle == Lifecycle::Closed {
                return Ok(());
            }
            if !state.inputs[input].is_full() || stream.overflow_policy != OverflowPolicy::Block {
                break;
            }
            if run.is_cancelled() {
                return Err(SendError::Cancelled);
            }
            state = self
                .space
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }

        let queue = &mut state.inputs[input];
        let full_before = queue.is_full();
        if full_before {
            match stream.overflow_policy {
                OverflowPolicy::Error => {
                    return Err(SendError::Overflow {
                        capacity: stream.capacity.unwrap_or_default(),
                    })
                }
                OverflowPolicy::DropOldest => {
                    if let Some(dropped) = queue.pop() {
                        PacketDropped {
                            stream: &stream.name,
                            node_id: &self.id,
                            timestamp: dropped.timestamp(),
                        }
                        .log();
                    }
                }
                OverflowPolicy::Block => {}
            }
        }

        queue.push(packet);
        queue.advance_bound(bound);
        if !full_before && queue.is_full() {
            stream.consumer_filled();
        }
        drop(state);

        run.schedule(self.index);
        Ok(())
    }

    pub fn advance_input_bound(&self, run: &RunState, input: usize, bound: Timestamp) {
        {
            let mut state = self.lock_state();
            if state.lifecycle == Lifecycle::Closed {
                return;
            }
            state.inputs[input].advance_bound(bound);
        }
        run.schedule(self.index);
    }

    /// Wakes senders blocked on this node's queues.
    pub fn wake_senders(&self) {
        let _state = self.lock_state();
        self.space.notify_all();
    }

    pub fn input_bound(&self, input: usize) -> Timestamp {
        self.lock_state().inputs[input].bound()
    }

    fn side_packets_resolved(&self, run: &RunState) -> bool {
        self.input_side_packets
            .iter()
            .all(|binding| run.side_packets[binding.slot].is_resolved())
    }

    fn is_throttled(&self, run: &RunState) -> bool {
        self.outputs
            .iter()
            .any(|output| run.streams[output.stream].is_throttled())
    }

    /// Decides what the task currently running for this node should do.
    /// Returns the action plus the output bound to propagate, if any.
    fn next_action(&self, run: &RunState) -> (Action, Option<Timestamp>, Vec<usize>) {
        let mut state = self.lock_state();
        state.queued = false;
        let mut drained = Vec::new();

        let action = match state.lifecycle {
            Lifecycle::Opening | Lifecycle::Closing | Lifecycle::Closed => Action::Nothing,
            Lifecycle::Unopened if run.is_cancelled() => {
                state.lifecycle = Lifecycle::Closing;
                Action::Close { opened: false }
            }
            Lifecycle::Unopened if self.side_packets_resolved(run) => {
                state.lifecycle = Lifecycle::Opening;
                Action::Open
            }
            Lifecycle::Unopened => Action::Nothing,
            Lifecycle::Active if run.is_cancelled() || state.stop_requested => {
                if state.in_flight == 0 {
                    state.lifecycle = Lifecycle::Closing;
                    Action::Close { opened: true }
                } else {
                    Action::Nothing
                }
            }
            Lifecycle::Active if self.is_source() => {
                if state.in_flight < self.max_in_flight && !self.is_throttled(run) {
                    Action::Invoke(self.begin_invocation(&mut state, Timestamp::UNSET, Vec::new()))
                } else {
                    Action::Nothing
                }
            }
            Lifecycle::Active => {
                let inputs: Vec<_> = state.inputs.iter().map(InputQueue::state).collect();
                match self.policy.readiness(&inputs) {
                    Readiness::Done if state.in_flight == 0 => {
                        state.lifecycle = Lifecycle::Closing;
                        Action::Close { opened: true }
                    }
                    Readiness::Ready { timestamp, take }
                        if state.in_flight < self.max_in_flight && !self.is_throttled(run) =>
                    {
                        let mut packets = vec![Packet::empty().at(timestamp); state.inputs.len()];
                        for index in take {
                            let queue = &mut state.inputs[index];
                            let full_before = queue.is_full();
                            if let Some(packet) = queue.pop() {
                                packets[index] = packet;
                            }
                            if full_before && !queue.is_full() {
                                drained.push(self.inputs[index].stream);
                            }
                        }
                        Action::Invoke(self.begin_invocation(&mut state, timestamp, packets))
                    }
                    _ => Action::Nothing,
                }
            }
        };

        let floor = (state.lifecycle == Lifecycle::Active && !self.is_source())
            .then(|| state.output_floor());
        (action, floor, drained)
    }

    fn begin_invocation(&self, state: &mut NodeState, timestamp: Timestamp, inputs: Vec<Packet>) -> Invocation {
        let seq = state.next_seq;
        state.next_seq += 1;
        state.in_flight += 1;
        state.invocations += 1;
        state.pending_timestamps.insert(seq, timestamp);
        Invocation {
            seq,
            timestamp,
            inputs,
        }
    }

    fn propagate_floor(&self, run: &RunState, floor: Option<Timestamp>) {
        if let Some(floor) = floor {
            for output in &self.outputs {
                run.streams[output.stream].advance_bound(run, floor);
            }
        }
    }

    fn after_drain(&self, run: &RunState, drained: Vec<usize>) {
        if drained.is_empty() {
            return;
        }
        self.space.notify_all();
        for stream in drained {
            run.streams[stream].consumer_drained(run);
        }
    }

    /// Applies one output action to its stream.
    pub(crate) fn apply(&self, run: &RunState, emission: Emission) -> NodeResult<()> {
        match emission {
            Emission::Packet { output, packet } => {
                let binding = &self.outputs[output];
                let stream = &run.streams[binding.stream];
                let timestamp = packet.timestamp();
                stream
                    .send(run, packet, false)
                    .map_err(|e| send_error_to_node_error(e, &binding.port, &stream.name, timestamp))
            }
            Emission::Bound { output, bound } => {
                run.streams[self.outputs[output].stream].advance_bound(run, bound);
                Ok(())
            }
            Emission::Close { output } => {
                run.streams[self.outputs[output].stream].close(run);
                Ok(())
            }
        }
    }

    /// Commits buffered outputs in dispatch order.
    fn commit(&self, run: &RunState, seq: u64, timestamp: Timestamp, emissions: Vec<Emission>) {
        let mut emission = lock(&self.emission);
        emission.finished.insert(seq, (timestamp, emissions));

        loop {
            let next = emission.next_commit;
            let Some((timestamp, batch)) = emission.finished.remove(&next) else {
                break;
            };
            for item in batch {
                if let Err(error) = self.apply(run, item) {
                    report_failure(run, self, NodePhase::Process, timestamp, error);
                    break;
                }
            }
            self.lock_state().pending_timestamps.remove(&next);
            emission.next_commit += 1;
        }
    }
}

fn send_error_to_node_error(error: SendError, port: &str, stream: &str, timestamp: Timestamp) -> NodeError {
    match error {
        SendError::Closed => NodeError::OutputClosed {
            port: port.to_string(),
        },
        SendError::InvalidTimestamp(timestamp) => NodeError::InvalidTimestamp { timestamp },
        SendError::OutOfOrder { bound, .. } => NodeError::TimestampOutOfOrder {
            port: port.to_string(),
            timestamp,
            bound,
        },
        SendError::Overflow { capacity } => NodeError::QueueOverflow {
            stream: stream.to_string(),
            capacity,
        },
        SendError::Cancelled => NodeError::Cancelled,
    }
}

/// Fails the run, unless the error is only fallout of a cancellation already
/// under way.
fn report_failure(run: &RunState, node: &NodeRuntime, phase: NodePhase, timestamp: Timestamp, error: NodeError) {
    if run.is_cancelled() && matches!(error, NodeError::Cancelled | NodeError::OutputClosed { .. }) {
        return;
    }
    run.fail(GraphError::node_failure(&node.id, phase, timestamp, error));
}

fn guarded<T>(call: impl FnOnce() -> NodeResult<T>) -> NodeResult<T> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "node panicked".to_string());
        Err(NodeError::Failed(format!("panicked: {}", message)))
    })
}

/// Body of every scheduler task: evaluate one node and act on it.
pub(crate) fn run_task(run: &Arc<RunState>, index: usize) {
    let node = &run.nodes[index];
    let (action, floor, drained) = node.next_action(run);

    node.after_drain(run, drained);
    node.propagate_floor(run, floor);

    match action {
        Action::Nothing => {}
        Action::Open => open_node(run, node),
        Action::Invoke(invocation) => {
            if node.max_in_flight > 1 {
                run.schedule(index);
            }
            invoke(run, node, invocation);
        }
        Action::Close { opened } => close_node(run, node, opened),
    }
}

fn open_node(run: &RunState, node: &NodeRuntime) {
    let mut cx = NodeContext::new(run, node, NodePhase::Open, Timestamp::UNSET, Vec::new(), false);
    let result = guarded(|| node.node.open(&mut cx));
    drop(cx);

    match result {
        Ok(()) => {
            node.lock_state().lifecycle = Lifecycle::Active;
            NodeOpened {
                node_id: &node.id,
                kind: &node.kind,
                policy: node.policy_name(),
            }
            .log();
            run.schedule(node.index);
        }
        Err(error) => {
            report_failure(run, node, NodePhase::Open, Timestamp::UNSET, error);
            node.lock_state().lifecycle = Lifecycle::Closing;
            close_node(run, node, false);
        }
    }
}

fn invoke(run: &RunState, node: &NodeRuntime, invocation: Invocation) {
    let buffered = node.max_in_flight > 1;
    let Invocation {
        seq,
        timestamp,
        inputs,
    } = invocation;

    let started = NodeInvocationStarted {
        node_id: &node.id,
        timestamp,
    };
    let span = started.span("node_invocation");
    let _guard = span.enter();
    started.log();
    let start_time = Instant::now();

    let mut cx = NodeContext::new(run, node, NodePhase::Process, timestamp, inputs, buffered);
    let result = guarded(|| node.node.process(&mut cx));
    let emissions = cx.take_emissions();
    drop(cx);

    let outcome = match result {
        Ok(outcome) => {
            NodeInvocationCompleted {
                node_id: &node.id,
                timestamp,
                outcome,
                duration: start_time.elapsed(),
            }
            .log();
            Some(outcome)
        }
        Err(error) => {
            report_failure(run, node, NodePhase::Process, timestamp, error);
            None
        }
    };

    if buffered {
        let emissions = if outcome.is_some() { emissions } else { Vec::new() };
        node.commit(run, seq, timestamp, emissions);
    }

    let floor = {
        let mut state = node.lock_state();
        state.in_flight -= 1;
        if !buffered {
            state.pending_timestamps.remove(&seq);
        }
        if outcome == Some(ProcessOutcome::Stop) {
            state.stop_requested = true;
        }
        (state.lifecycle == Lifecycle::Active && !node.is_source() && !state.stop_requested)
            .then(|| state.output_floor())
    };
    node.propagate_floor(run, floor);
    run.schedule(node.index);
}

fn close_node(run: &RunState, node: &NodeRuntime, opened: bool) {
    if opened {
        let mut cx = NodeContext::new(run, node, NodePhase::Close, Timestamp::UNSET, Vec::new(), false);
        let result = guarded(|| node.node.close(&mut cx));
        drop(cx);
        if let Err(error) = result {
            report_failure(run, node, NodePhase::Close, Timestamp::UNSET, error);
        }
    }

    for output in &node.outputs {
        run.streams[output.stream].close(run);
    }

    for binding in &node.output_side_packets {
        let slot = &run.side_packets[binding.slot];
        if slot.mark_absent() {
            let spec = &run.topology.side_packets[binding.slot];
            if spec.is_required() && !run.is_cancelled() {
                run.fail(GraphError::MissingSidePacket {
                    node_id: node.id.clone(),
                    side_packet: slot.name.clone(),
                });
            }
            run.schedule_side_packet_consumers(binding.slot);
        }
    }

    let (drained, invocations) = {
        let mut state = node.lock_state();
        state.lifecycle = Lifecycle::Closed;
        state.queued = false;
        let mut drained = Vec::new();
        for (index, queue) in state.inputs.iter_mut().enumerate() {
            if queue.is_full() {
                drained.push(node.inputs[index].stream);
            }
            queue.close();
        }
        (drained, state.invocations)
    };
    node.space.notify_all();
    for stream in drained {
        run.streams[stream].consumer_drained(run);
    }

    NodeClosed {
        node_id: &node.id,
        invocations,
    }
    .log();
    run.node_closed();
}
