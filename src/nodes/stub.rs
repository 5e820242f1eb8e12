// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node kinds used only by tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::engine::NodeContext;
use crate::errors::{NodeError, NodePhase, NodeResult};
use crate::packet::{Packet, PayloadType, Timestamp};
use crate::traits::{Node, NodeContract, ProcessOutcome};

fn forward(cx: &mut NodeContext<'_>, port: &str) -> NodeResult<ProcessOutcome> {
    let packet = cx.input(port)?.clone();
    if packet.is_empty() {
        return Ok(ProcessOutcome::NoOutput);
    }
    cx.send("out", packet)?;
    Ok(ProcessOutcome::Processed)
}

/// Fails (or panics) in one phase; otherwise forwards `in` to `out`.
pub(crate) struct FailingNode {
    phase: NodePhase,
    at: Timestamp,
    panics: bool,
}

impl FailingNode {
    pub fn on_open() -> Self {
        Self {
            phase: NodePhase::Open,
            at: Timestamp::UNSET,
            panics: false,
        }
    }

    pub fn on_process(at: i64) -> Self {
        Self {
            phase: NodePhase::Process,
            at: Timestamp::new(at),
            panics: false,
        }
    }

    pub fn panicking(at: i64) -> Self {
        Self {
            panics: true,
            ..Self::on_process(at)
        }
    }

    pub fn on_close() -> Self {
        Self {
            phase: NodePhase::Close,
            at: Timestamp::UNSET,
            panics: false,
        }
    }

    fn fail(&self) -> NodeResult<()> {
        if self.panics {
            panic!("exploded at {}", self.at);
        }
        Err(NodeError::Failed(format!("boom in {}", self.phase)))
    }
}

impl Node for FailingNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .optional_output("out", PayloadType::Any)
    }

    fn open(&self, _cx: &mut NodeContext<'_>) -> NodeResult<()> {
        if self.phase == NodePhase::Open {
            self.fail()?;
        }
        Ok(())
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        if self.phase == NodePhase::Process && cx.input_timestamp() == self.at {
            self.fail()?;
        }
        forward(cx, "in")
    }

    fn close(&self, _cx: &mut NodeContext<'_>) -> NodeResult<()> {
        if self.phase == NodePhase::Close {
            self.fail()?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[derive(Default)]
struct GateState {
    open: bool,
    entered: usize,
}

/// Shared switch that holds `GatedNode` invocations until opened.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl Gate {
    pub fn open(&self) {
        let (state, changed) = &*self.inner;
        state.lock().unwrap().open = true;
        changed.notify_all();
    }

    /// Blocks until `count` invocations have reached the gate.
    pub fn wait_entered(&self, count: usize) {
        let (state, changed) = &*self.inner;
        let mut state = state.lock().unwrap();
        while state.entered < count {
            state = changed.wait(state).unwrap();
        }
    }

    fn pass(&self, cx: &NodeContext<'_>) -> bool {
        let (state, changed) = &*self.inner;
        let mut state = state.lock().unwrap();
        state.entered += 1;
        changed.notify_all();
        while !state.open {
            if cx.is_cancelled() {
                return false;
            }
            state = changed.wait_timeout(state, Duration::from_millis(10)).unwrap().0;
        }
        true
    }
}

/// Forwards `in` to `out` once its gate opens.
pub(crate) struct GatedNode {
    gate: Gate,
}

impl GatedNode {
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }
}

impl Node for GatedNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .output("out", PayloadType::Any)
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        if !self.gate.pass(cx) {
            return Ok(ProcessOutcome::NoOutput);
        }
        forward(cx, "in")
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[derive(Debug, Default)]
pub(crate) struct Recording {
    pub opened: usize,
    pub closed: usize,
    /// Side packet seen at open, if the node declares one.
    pub side_packet: Option<Packet>,
    pub invocations: Vec<(Timestamp, Vec<Packet>)>,
}

#[derive(Clone, Default)]
pub(crate) struct Recorder {
    inner: Arc<Mutex<Recording>>,
}

impl Recorder {
    pub fn with<R>(&self, f: impl FnOnce(&Recording) -> R) -> R {
        f(&self.inner.lock().unwrap())
    }

    pub fn invocation_timestamps(&self) -> Vec<Timestamp> {
        self.with(|r| r.invocations.iter().map(|(ts, _)| *ts).collect())
    }
}

/// Records every invocation; forwards the first input to `out`.
pub(crate) struct RecordingNode {
    ports: Vec<String>,
    side_packet: Option<(String, PayloadType)>,
    recorder: Recorder,
}

impl RecordingNode {
    pub fn new(ports: &[&str], recorder: Recorder) -> Self {
        Self {
            ports: ports.iter().map(|port| port.to_string()).collect(),
            side_packet: None,
            recorder,
        }
    }

    pub fn requiring_side_packet(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.side_packet = Some((name.to_string(), payload_type));
        self
    }
}

impl Node for RecordingNode {
    fn contract(&self) -> NodeContract {
        let mut contract = self
            .ports
            .iter()
            .fold(NodeContract::new(), |contract, port| contract.input(port, PayloadType::Any))
            .optional_output("out", PayloadType::Any);
        if let Some((name, payload_type)) = &self.side_packet {
            contract = contract.input_side_packet(name, payload_type.clone());
        }
        contract
    }

    fn open(&self, cx: &mut NodeContext<'_>) -> NodeResult<()> {
        let side_packet = match &self.side_packet {
            Some((name, _)) => Some(cx.side_packet(name)?.clone()),
            None => None,
        };
        let mut recording = self.recorder.inner.lock().unwrap();
        recording.opened += 1;
        recording.side_packet = side_packet;
        Ok(())
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        let packets = self
            .ports
            .iter()
            .map(|port| cx.input(port).cloned())
            .collect::<NodeResult<Vec<_>>>()?;
        self.recorder
            .inner
            .lock()
            .unwrap()
            .invocations
            .push((cx.input_timestamp(), packets));
        forward(cx, &self.ports[0])
    }

    fn close(&self, _cx: &mut NodeContext<'_>) -> NodeResult<()> {
        self.recorder.inner.lock().unwrap().closed += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Tracks how many invocations overlap. Earlier timestamps sleep longer so
/// concurrent invocations finish out of order.
pub(crate) struct ConcurrencyProbeNode {
    max_in_flight: usize,
    current: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbeNode {
    pub fn new(max_in_flight: usize, peak: Arc<AtomicUsize>) -> Self {
        Self {
            max_in_flight,
            current: AtomicUsize::new(0),
            peak,
        }
    }
}

impl Node for ConcurrencyProbeNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .output("out", PayloadType::Any)
            .with_max_in_flight(self.max_in_flight)
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let delay = 8 - cx.input_timestamp().value().rem_euclid(4) * 2;
        std::thread::sleep(Duration::from_millis(delay as u64));

        self.current.fetch_sub(1, Ordering::SeqCst);
        forward(cx, "in")
    }

    fn name(&self) -> &'static str {
        "concurrency_probe"
    }
}

/// Forwards the first packet, then closes `out` early.
#[derive(Default)]
pub(crate) struct FirstOnlyNode {
    done: AtomicBool,
}

impl Node for FirstOnlyNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .output("out", PayloadType::Any)
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(ProcessOutcome::NoOutput);
        }
        forward(cx, "in")?;
        cx.close_output("out")?;
        Ok(ProcessOutcome::Processed)
    }

    fn name(&self) -> &'static str {
        "first_only"
    }
}

/// Forwards packets at even timestamps and skips the rest.
pub(crate) struct EvenOnlyNode;

impl Node for EvenOnlyNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .output("out", PayloadType::Any)
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        if cx.input_timestamp().value() % 2 != 0 {
            return Ok(ProcessOutcome::NoOutput);
        }
        forward(cx, "in")
    }

    fn name(&self) -> &'static str {
        "even_only"
    }
}

/// Declares an output side packet and never sets it.
pub(crate) struct SilentSideNode;

impl Node for SilentSideNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .output_side_packet("value", PayloadType::Text)
    }

    fn process(&self, _cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        Ok(ProcessOutcome::NoOutput)
    }

    fn name(&self) -> &'static str {
        "silent_side"
    }
}
