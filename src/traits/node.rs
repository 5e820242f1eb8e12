// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::consts::DEFAULT_MAX_IN_FLIGHT;
use crate::engine::NodeContext;
use crate::errors::NodeResult;
use crate::packet::PayloadType;
use crate::traits::input_policy::{InputPolicy, InputPolicyKind};

/// Result of a successful `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The invocation ran; outputs (if any) were sent.
    Processed,
    /// The invocation ran and deliberately produced nothing.
    NoOutput,
    /// The node is finished; its outputs close and `close` follows.
    Stop,
}

/// A named, typed port in a node contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub payload_type: PayloadType,
    pub optional: bool,
}

impl PortSpec {
    pub fn new(name: &str, payload_type: PayloadType) -> Self {
        Self {
            name: name.to_string(),
            payload_type,
            optional: false,
        }
    }

    pub fn optional(name: &str, payload_type: PayloadType) -> Self {
        Self {
            optional: true,
            ..Self::new(name, payload_type)
        }
    }
}

/// Ports and scheduling defaults a node declares.
///
/// # Example
/// ```
/// use streamgraph::packet::PayloadType;
/// use streamgraph::traits::NodeContract;
///
/// let contract = NodeContract::new()
///     .input("frames", PayloadType::Bytes)
///     .optional_input("hints", PayloadType::Json)
///     .output("labels", PayloadType::Text)
///     .with_max_in_flight(2);
///
/// assert_eq!(contract.inputs.len(), 2);
/// assert!(contract.inputs[1].optional);
/// ```
#[derive(Debug, Clone)]
pub struct NodeContract {
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub input_side_packets: Vec<PortSpec>,
    pub output_side_packets: Vec<PortSpec>,
    pub input_policy: InputPolicyKind,
    pub max_in_flight: usize,
}

impl Default for NodeContract {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_side_packets: Vec::new(),
            output_side_packets: Vec::new(),
            input_policy: InputPolicyKind::default(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl NodeContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.inputs.push(PortSpec::new(name, payload_type));
        self
    }

    pub fn optional_input(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.inputs.push(PortSpec::optional(name, payload_type));
        self
    }

    pub fn output(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.outputs.push(PortSpec::new(name, payload_type));
        self
    }

    pub fn optional_output(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.outputs.push(PortSpec::optional(name, payload_type));
        self
    }

    pub fn input_side_packet(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.input_side_packets.push(PortSpec::new(name, payload_type));
        self
    }

    pub fn optional_input_side_packet(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.input_side_packets.push(PortSpec::optional(name, payload_type));
        self
    }

    pub fn output_side_packet(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.output_side_packets.push(PortSpec::new(name, payload_type));
        self
    }

    pub fn optional_output_side_packet(mut self, name: &str, payload_type: PayloadType) -> Self {
        self.output_side_packets.push(PortSpec::optional(name, payload_type));
        self
    }

    pub fn with_policy(mut self, policy: InputPolicyKind) -> Self {
        self.input_policy = policy;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }
}

/// A unit of processing driven by the scheduler.
///
/// `open` runs once per run after the node's input side packets are
/// available, `process` runs once per dispatch decided by the node's input
/// policy, and `close` runs once when every input is exhausted or the run is
/// aborted. Methods take `&self` because a node with `max_in_flight > 1` is
/// invoked concurrently; per-run state lives behind interior mutability.
pub trait Node: Send + Sync {
    /// Declares ports and scheduling defaults. Called once per instance.
    fn contract(&self) -> NodeContract;

    fn open(&self, _cx: &mut NodeContext<'_>) -> NodeResult<()> {
        Ok(())
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome>;

    fn close(&self, _cx: &mut NodeContext<'_>) -> NodeResult<()> {
        Ok(())
    }

    /// A custom readiness policy. Used unless the graph description picks one.
    fn input_policy(&self) -> Option<Arc<dyn InputPolicy>> {
        None
    }

    fn name(&self) -> &'static str;
}
