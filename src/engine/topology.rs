// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Immutable, index-based form of a validated graph description.
//!
//! Building a [`Topology`] interns every stream and side packet name to an
//! index, checks port bindings against node contracts, and unifies payload
//! types between producers and consumers. Runs only ever touch indices.

use std::collections::{BTreeMap, HashMap};

use crate::config::consts::DEFAULT_EXECUTOR_NAME;
use crate::config::{
    validate_graph_config, DependencyGraph, GraphConfig, NodeConfig, NodeRegistry, OverflowPolicy,
};
use crate::errors::{GraphConfigError, ValidationError};
use crate::observability::messages::validation::{ValidationCompleted, ValidationFailed};
use crate::observability::messages::StructuredLog;
use crate::packet::PayloadType;
use crate::traits::{NodeContract, PortSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamProducer {
    GraphInput,
    Node(usize),
}

/// One consuming input port: node index and position in that node's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Consumer {
    pub node: usize,
    pub input: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct StreamSpec {
    pub name: String,
    pub payload_type: PayloadType,
    pub producer: StreamProducer,
    pub consumers: Vec<Consumer>,
    pub capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,
}

#[derive(Debug, Clone)]
pub(crate) struct SideConsumer {
    pub node: usize,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SidePacketSpec {
    pub name: String,
    pub payload_type: PayloadType,
    /// `None` when the host supplies the side packet to `start_run`.
    pub producer: Option<usize>,
    pub consumers: Vec<SideConsumer>,
}

impl SidePacketSpec {
    pub fn is_required(&self) -> bool {
        self.consumers.iter().any(|consumer| consumer.required)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InputBinding {
    pub port: String,
    pub stream: usize,
    pub back_edge: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct OutputBinding {
    pub port: String,
    pub stream: usize,
    pub payload_type: PayloadType,
}

#[derive(Debug, Clone)]
pub(crate) struct SideBinding {
    pub port: String,
    pub slot: usize,
    pub payload_type: PayloadType,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeSpec {
    pub config: NodeConfig,
    pub contract: NodeContract,
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<OutputBinding>,
    pub input_side_packets: Vec<SideBinding>,
    pub output_side_packets: Vec<SideBinding>,
    pub executor: usize,
    pub max_in_flight: usize,
    pub level: usize,
}

impl NodeSpec {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ExecutorSpec {
    pub name: String,
    pub num_threads: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Topology {
    pub nodes: Vec<NodeSpec>,
    pub streams: Vec<StreamSpec>,
    pub side_packets: Vec<SidePacketSpec>,
    pub input_streams: BTreeMap<String, usize>,
    pub host_side_packets: BTreeMap<String, usize>,
    pub executors: Vec<ExecutorSpec>,
}

impl Topology {
    /// Validates `config`, instantiates each node once to read its contract,
    /// and resolves every name to an index.
    pub fn build(config: &GraphConfig, registry: &NodeRegistry) -> Result<Self, GraphConfigError> {
        if let Err(errors) = validate_graph_config(config) {
            ValidationFailed {
                error_count: errors.len(),
            }
            .log();
            return Err(GraphConfigError::Validation(errors));
        }

        let mut contracts = Vec::with_capacity(config.nodes.len());
        for node_config in &config.nodes {
            contracts.push(registry.create(node_config)?.contract());
        }

        let mut errors = Vec::new();
        for (node_config, contract) in config.nodes.iter().zip(&contracts) {
            errors.extend(check_bindings(node_config, contract));
        }

        let executors = executor_specs(config);
        let levels = DependencyGraph::from_config(config)
            .topological_levels()
            .unwrap_or_default();

        let mut builder = Builder::default();
        for name in &config.input_streams {
            builder.stream(name, StreamProducer::GraphInput, PayloadType::Any);
        }

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for (index, (node_config, contract)) in config.nodes.iter().zip(contracts).enumerate() {
            let outputs = ports_in_contract_order(&contract.outputs, &node_config.outputs)
                .map(|(spec, stream)| OutputBinding {
                    port: spec.name.clone(),
                    stream: builder.stream(stream, StreamProducer::Node(index), spec.payload_type.clone()),
                    payload_type: spec.payload_type.clone(),
                })
                .collect();
            let output_side_packets =
                ports_in_contract_order(&contract.output_side_packets, &node_config.output_side_packets)
                    .map(|(spec, name)| SideBinding {
                        port: spec.name.clone(),
                        slot: builder.side_packet(name, Some(index), spec.payload_type.clone()),
                        payload_type: spec.payload_type.clone(),
                    })
                    .collect();

            let executor = node_config
                .executor
                .as_deref()
                .and_then(|name| executors.iter().position(|e| e.name == name))
                .unwrap_or(0);

            nodes.push(NodeSpec {
                config: node_config.clone(),
                max_in_flight: node_config.max_in_flight.unwrap_or(contract.max_in_flight),
                contract,
                inputs: Vec::new(),
                outputs,
                input_side_packets: Vec::new(),
                output_side_packets,
                executor,
                level: levels.get(&node_config.id).copied().unwrap_or(0),
            });
        }

        for name in &config.input_side_packets {
            builder.side_packet(name, None, PayloadType::Any);
        }

        // consumers are resolved once every producer is interned
        for (index, node) in nodes.iter_mut().enumerate() {
            let contract = node.contract.clone();
            for (spec, stream) in ports_in_contract_order(&contract.inputs, &node.config.inputs) {
                let Some(&stream_index) = builder.stream_index.get(stream.as_str()) else {
                    continue;
                };
                let input = node.inputs.len();
                builder.streams[stream_index].consumers.push(Consumer { node: index, input });
                errors.extend(builder.unify_stream(stream_index, &node.config.id, &spec.payload_type));
                node.inputs.push(InputBinding {
                    port: spec.name.clone(),
                    stream: stream_index,
                    back_edge: node.config.back_edges.contains(&spec.name),
                });
            }

            for (spec, name) in
                ports_in_contract_order(&contract.input_side_packets, &node.config.input_side_packets)
            {
                let Some(&slot) = builder.side_packet_index.get(name.as_str()) else {
                    continue;
                };
                builder.side_packets[slot].consumers.push(SideConsumer {
                    node: index,
                    required: !spec.optional,
                });
                errors.extend(builder.unify_side_packet(slot, &node.config.id, &spec.payload_type));
                node.input_side_packets.push(SideBinding {
                    port: spec.name.clone(),
                    slot,
                    payload_type: spec.payload_type.clone(),
                });
            }
        }

        if !errors.is_empty() {
            ValidationFailed {
                error_count: errors.len(),
            }
            .log();
            return Err(GraphConfigError::Validation(errors));
        }

        for stream in &mut builder.streams {
            let (capacity, overflow_policy) = config.stream_settings(&stream.name);
            stream.capacity = capacity;
            stream.overflow_policy = overflow_policy;
        }

        let input_streams = config
            .input_streams
            .iter()
            .filter_map(|name| builder.stream_index.get(name).map(|&i| (name.clone(), i)))
            .collect();
        let host_side_packets = config
            .input_side_packets
            .iter()
            .filter_map(|name| builder.side_packet_index.get(name).map(|&i| (name.clone(), i)))
            .collect();

        ValidationCompleted {
            node_count: nodes.len(),
            stream_count: builder.streams.len(),
        }
        .log();

        Ok(Self {
            nodes,
            streams: builder.streams,
            side_packets: builder.side_packets,
            input_streams,
            host_side_packets,
            executors,
        })
    }

    pub fn stream_index(&self, name: &str) -> Option<usize> {
        self.streams.iter().position(|stream| stream.name == name)
    }

    pub fn has_source_nodes(&self) -> bool {
        self.nodes.iter().any(NodeSpec::is_source)
    }
}

#[derive(Default)]
struct Builder {
    streams: Vec<StreamSpec>,
    stream_index: HashMap<String, usize>,
    side_packets: Vec<SidePacketSpec>,
    side_packet_index: HashMap<String, usize>,
}

impl Builder {
    fn stream(&mut self, name: &str, producer: StreamProducer, payload_type: PayloadType) -> usize {
        if let Some(&index) = self.stream_index.get(name) {
            return index;
        }
        self.streams.push(StreamSpec {
            name: name.to_string(),
            payload_type,
            producer,
            consumers: Vec::new(),
            capacity: None,
            overflow_policy: OverflowPolicy::default(),
        });
        self.stream_index.insert(name.to_string(), self.streams.len() - 1);
        self.streams.len() - 1
    }

    fn side_packet(&mut self, name: &str, producer: Option<usize>, payload_type: PayloadType) -> usize {
        if let Some(&index) = self.side_packet_index.get(name) {
            return index;
        }
        self.side_packets.push(SidePacketSpec {
            name: name.to_string(),
            payload_type,
            producer,
            consumers: Vec::new(),
        });
        self.side_packet_index.insert(name.to_string(), self.side_packets.len() - 1);
        self.side_packets.len() - 1
    }

    /// Host-fed streams take the first concrete type a consumer asks for;
    /// node-fed streams keep the producer's declaration.
    fn unify_stream(&mut self, index: usize, node_id: &str, consumed: &PayloadType) -> Option<ValidationError> {
        let stream = &mut self.streams[index];
        if stream.producer == StreamProducer::GraphInput && stream.payload_type == PayloadType::Any {
            stream.payload_type = consumed.clone();
            return None;
        }
        (!stream.payload_type.is_compatible_with(consumed)).then(|| ValidationError::TypeMismatch {
            stream: stream.name.clone(),
            node_id: node_id.to_string(),
            produced: stream.payload_type.clone(),
            consumed: consumed.clone(),
        })
    }

    fn unify_side_packet(&mut self, index: usize, node_id: &str, consumed: &PayloadType) -> Option<ValidationError> {
        let side_packet = &mut self.side_packets[index];
        if side_packet.producer.is_none() && side_packet.payload_type == PayloadType::Any {
            side_packet.payload_type = consumed.clone();
            return None;
        }
        (!side_packet.payload_type.is_compatible_with(consumed)).then(|| ValidationError::TypeMismatch {
            stream: side_packet.name.clone(),
            node_id: node_id.to_string(),
            produced: side_packet.payload_type.clone(),
            consumed: consumed.clone(),
        })
    }
}

fn ports_in_contract_order<'a>(
    specs: &'a [PortSpec],
    bindings: &'a BTreeMap<String, String>,
) -> impl Iterator<Item = (&'a PortSpec, &'a String)> + 'a {
    specs
        .iter()
        .filter_map(move |spec| bindings.get(&spec.name).map(|bound| (spec, bound)))
}

fn check_bindings(config: &NodeConfig, contract: &NodeContract) -> Vec<ValidationError> {
    let groups: [(&'static str, &[PortSpec], &BTreeMap<String, String>); 4] = [
        ("input", &contract.inputs, &config.inputs),
        ("output", &contract.outputs, &config.outputs),
        ("input side packet", &contract.input_side_packets, &config.input_side_packets),
        ("output side packet", &contract.output_side_packets, &config.output_side_packets),
    ];

    let mut errors = Vec::new();
    for (direction, specs, bindings) in groups {
        for port in bindings.keys() {
            if !specs.iter().any(|spec| &spec.name == port) {
                errors.push(ValidationError::UnknownPort {
                    node_id: config.id.clone(),
                    direction,
                    port: port.clone(),
                });
            }
        }
        for spec in specs.iter().filter(|spec| !spec.optional) {
            if !bindings.contains_key(&spec.name) {
                errors.push(ValidationError::MissingPort {
                    node_id: config.id.clone(),
                    direction,
                    port: spec.name.clone(),
                });
            }
        }
    }
    errors
}

fn executor_specs(config: &GraphConfig) -> Vec<ExecutorSpec> {
    let mut executors = vec![ExecutorSpec {
        name: DEFAULT_EXECUTOR_NAME.to_string(),
        num_threads: config.default_thread_count(),
    }];
    executors.extend(config.executors.iter().map(|executor| ExecutorSpec {
        name: executor.name.clone(),
        num_threads: executor.num_threads.unwrap_or(1),
    }));
    executors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_yaml, StreamConfig};

    fn build(yaml: &str) -> Result<Topology, GraphConfigError> {
        Topology::build(&parse_yaml(yaml).unwrap(), &NodeRegistry::with_builtin_nodes())
    }

    #[test]
    fn test_streams_resolved_to_indices() {
        let topology = build(
            r#"
input_streams: [text]
output_streams: [shifted]
nodes:
  - id: upper
    kind: text_case
    inputs: { in: text }
    outputs: { out: upper }
  - id: shift
    kind: timestamp_shift
    inputs: { in: upper }
    outputs: { out: shifted }
    options: { offset: 10 }
"#,
        )
        .unwrap();

        assert_eq!(topology.streams.len(), 3);
        let text = topology.input_streams["text"];
        assert_eq!(topology.streams[text].producer, StreamProducer::GraphInput);
        assert_eq!(topology.streams[text].payload_type, PayloadType::Text);
        assert_eq!(topology.streams[text].consumers, vec![Consumer { node: 0, input: 0 }]);

        let upper = topology.stream_index("upper").unwrap();
        assert_eq!(topology.streams[upper].producer, StreamProducer::Node(0));
        assert_eq!(topology.nodes[1].inputs[0].stream, upper);
        assert_eq!(topology.nodes[1].level, 1);
        assert!(!topology.has_source_nodes());
    }

    #[test]
    fn test_contract_errors_accumulate() {
        let result = build(
            r#"
input_streams: [numbers]
nodes:
  - id: upper
    kind: text_case
    inputs: { in: numbers, extra: numbers }
  - id: count
    kind: counter_source
    outputs: { out: counts }
  - id: upper2
    kind: text_case
    inputs: { in: counts }
    outputs: { out: shouted }
"#,
        );

        let errors = result.unwrap_err().validation_errors().to_vec();
        assert!(errors.contains(&ValidationError::UnknownPort {
            node_id: "upper".to_string(),
            direction: "input",
            port: "extra".to_string(),
        }));
        assert!(errors.contains(&ValidationError::MissingPort {
            node_id: "upper".to_string(),
            direction: "output",
            port: "out".to_string(),
        }));
        assert!(errors.contains(&ValidationError::TypeMismatch {
            stream: "counts".to_string(),
            node_id: "upper2".to_string(),
            produced: PayloadType::Int,
            consumed: PayloadType::Text,
        }));
    }

    #[test]
    fn test_unknown_kind_fails_fast() {
        let result = build("nodes: [ { id: a, kind: warp_drive } ]");
        assert!(matches!(result, Err(GraphConfigError::UnknownNodeKind { .. })));
    }

    #[test]
    fn test_stream_settings_and_executors() {
        let mut config = parse_yaml(
            r#"
input_streams: [in]
max_queue_size: 4
executors: [ { name: io, num_threads: 2 } ]
nodes:
  - id: pass
    kind: pass_through
    executor: io
    max_in_flight: 3
    inputs: { in: in }
    outputs: { out: out }
"#,
        )
        .unwrap();
        config.streams.push(StreamConfig {
            name: "out".to_string(),
            max_queue_size: Some(1),
            overflow_policy: Some(OverflowPolicy::Error),
        });

        let topology = Topology::build(&config, &NodeRegistry::with_builtin_nodes()).unwrap();
        let input = topology.input_streams["in"];
        let output = topology.stream_index("out").unwrap();
        assert_eq!(topology.streams[input].capacity, Some(4));
        assert_eq!(topology.streams[output].capacity, Some(1));
        assert_eq!(topology.streams[output].overflow_policy, OverflowPolicy::Error);
        assert_eq!(topology.executors[topology.nodes[0].executor].name, "io");
        assert_eq!(topology.nodes[0].max_in_flight, 3);
    }
}
