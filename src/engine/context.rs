// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::node_runner::NodeRuntime;
use crate::engine::scheduler::RunState;
use crate::errors::{NodeError, NodePhase, NodeResult};
use crate::observability::messages::node::SidePacketSet;
use crate::observability::messages::StructuredLog;
use crate::packet::{Packet, Payload, Timestamp};

/// One output action of a node, applied directly or after ordering.
#[derive(Debug)]
pub(crate) enum Emission {
    Packet { output: usize, packet: Packet },
    Bound { output: usize, bound: Timestamp },
    Close { output: usize },
}

/// What a node sees during `open`, `process` and `close`.
///
/// Inputs are read-only and outputs write-only: a node cannot observe what it
/// sends, nor inject packets into its own inputs. Ports are addressed by the
/// names declared in the node's contract. A declared optional port that the
/// graph leaves unbound reads as an empty packet and silently discards sends.
///
/// # Example
/// ```
/// use streamgraph::engine::NodeContext;
/// use streamgraph::errors::NodeResult;
/// use streamgraph::traits::ProcessOutcome;
///
/// fn double(cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
///     let value = *cx.input("in")?.get::<i64>()?;
///     cx.emit("out", value * 2)?;
///     Ok(ProcessOutcome::Processed)
/// }
/// ```
pub struct NodeContext<'a> {
    run: &'a RunState,
    node: &'a NodeRuntime,
    phase: NodePhase,
    input_timestamp: Timestamp,
    inputs: Vec<Packet>,
    empty: Packet,
    buffered: bool,
    emissions: Vec<Emission>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        run: &'a RunState,
        node: &'a NodeRuntime,
        phase: NodePhase,
        input_timestamp: Timestamp,
        inputs: Vec<Packet>,
        buffered: bool,
    ) -> Self {
        Self {
            run,
            node,
            phase,
            input_timestamp,
            inputs,
            empty: Packet::empty().at(input_timestamp),
            buffered,
            emissions: Vec::new(),
        }
    }

    pub(crate) fn take_emissions(&mut self) -> Vec<Emission> {
        std::mem::take(&mut self.emissions)
    }

    pub fn node_id(&self) -> &str {
        &self.node.id
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    /// Timestamp of the current invocation; `Unset` outside `process` and
    /// for source nodes.
    pub fn input_timestamp(&self) -> Timestamp {
        self.input_timestamp
    }

    /// The packet delivered on `port` for this invocation. Empty when the
    /// input had nothing at this timestamp.
    pub fn input(&self, port: &str) -> NodeResult<&Packet> {
        match self.node.inputs.iter().position(|binding| binding.port == port) {
            Some(index) => Ok(self.inputs.get(index).unwrap_or(&self.empty)),
            None if self.node.contract.inputs.iter().any(|spec| spec.name == port) => Ok(&self.empty),
            None => Err(unknown_port("input", port)),
        }
    }

    /// True when `port` carries a non-empty packet in this invocation.
    pub fn has_input(&self, port: &str) -> bool {
        self.input(port).map(|packet| !packet.is_empty()).unwrap_or(false)
    }

    /// Current timestamp bound of an input: no later packet on it will be
    /// older than this.
    pub fn input_bound(&self, port: &str) -> NodeResult<Timestamp> {
        self.node
            .inputs
            .iter()
            .position(|binding| binding.port == port)
            .map(|index| self.node.input_bound(index))
            .ok_or_else(|| unknown_port("input", port))
    }

    pub fn side_packet(&self, port: &str) -> NodeResult<&'a Packet> {
        let run = self.run;
        match self.node.input_side_packets.iter().find(|binding| binding.port == port) {
            Some(binding) => run.side_packets[binding.slot]
                .get()
                .ok_or_else(|| NodeError::SidePacketUnavailable {
                    name: port.to_string(),
                }),
            None if self
                .node
                .contract
                .input_side_packets
                .iter()
                .any(|spec| spec.name == port) =>
            {
                Err(NodeError::SidePacketUnavailable {
                    name: port.to_string(),
                })
            }
            None => Err(unknown_port("input side packet", port)),
        }
    }

    pub fn has_side_packet(&self, port: &str) -> bool {
        self.side_packet(port).is_ok()
    }

    /// Sends `packet` on an output port.
    ///
    /// The timestamp must be allowed in a stream, not below the stream's
    /// bound, and during `process` not below the invocation timestamp.
    pub fn send(&mut self, port: &str, packet: Packet) -> NodeResult<()> {
        let Some(output) = self.output_index(port)? else {
            return Ok(());
        };

        let binding = &self.node.outputs[output];
        if let Some(payload) = packet.payload() {
            if !binding.payload_type.accepts(payload) {
                return Err(NodeError::OutputTypeMismatch {
                    port: port.to_string(),
                    declared: binding.payload_type.clone(),
                    actual: payload.payload_type(),
                });
            }
        }

        let timestamp = packet.timestamp();
        if !timestamp.is_allowed_in_stream() {
            return Err(NodeError::InvalidTimestamp { timestamp });
        }
        if self.phase == NodePhase::Process && timestamp < self.input_timestamp {
            return Err(NodeError::TimestampOutOfOrder {
                port: port.to_string(),
                timestamp,
                bound: self.input_timestamp,
            });
        }

        self.dispatch(Emission::Packet { output, packet })
    }

    /// Sends `value` at the invocation timestamp.
    pub fn emit(&mut self, port: &str, value: impl Into<Payload>) -> NodeResult<()> {
        let packet = Packet::new(value).at(self.input_timestamp);
        self.send(port, packet)
    }

    /// Promises that `port` carries nothing below `bound`, without a packet.
    pub fn set_next_timestamp_bound(&mut self, port: &str, bound: Timestamp) -> NodeResult<()> {
        match self.output_index(port)? {
            Some(output) => self.dispatch(Emission::Bound { output, bound }),
            None => Ok(()),
        }
    }

    /// Closes a single output before the node itself closes.
    pub fn close_output(&mut self, port: &str) -> NodeResult<()> {
        match self.output_index(port)? {
            Some(output) => self.dispatch(Emission::Close { output }),
            None => Ok(()),
        }
    }

    /// Sets an output side packet. Each side packet can be set once per run.
    pub fn set_side_packet(&mut self, port: &str, packet: Packet) -> NodeResult<()> {
        let binding = match self.node.output_side_packets.iter().find(|b| b.port == port) {
            Some(binding) => binding,
            None if self
                .node
                .contract
                .output_side_packets
                .iter()
                .any(|spec| spec.name == port) =>
            {
                return Ok(())
            }
            None => return Err(unknown_port("output side packet", port)),
        };

        if let Some(payload) = packet.payload() {
            if !binding.payload_type.accepts(payload) {
                return Err(NodeError::OutputTypeMismatch {
                    port: port.to_string(),
                    declared: binding.payload_type.clone(),
                    actual: payload.payload_type(),
                });
            }
        }

        let slot = &self.run.side_packets[binding.slot];
        slot.set(packet)?;
        SidePacketSet {
            node_id: &self.node.id,
            side_packet: &slot.name,
        }
        .log();
        self.run.schedule_side_packet_consumers(binding.slot);
        Ok(())
    }

    /// True once the run has failed or is being torn down. Long-running
    /// nodes should check this and return early.
    pub fn is_cancelled(&self) -> bool {
        self.run.is_cancelled()
    }

    fn output_index(&self, port: &str) -> NodeResult<Option<usize>> {
        match self.node.outputs.iter().position(|binding| binding.port == port) {
            Some(index) => Ok(Some(index)),
            None if self.node.contract.outputs.iter().any(|spec| spec.name == port) => Ok(None),
            None => Err(unknown_port("output", port)),
        }
    }

    fn dispatch(&mut self, emission: Emission) -> NodeResult<()> {
        if self.buffered {
            self.emissions.push(emission);
            Ok(())
        } else {
            self.node.apply(self.run, emission)
        }
    }
}

fn unknown_port(direction: &'static str, port: &str) -> NodeError {
    NodeError::UnknownPort {
        direction,
        port: port.to_string(),
    }
}
