// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Name-level validation of a graph description.
//!
//! These checks need nothing but the description itself:
//!
//! 1. **Uniqueness**: node ids and executor names
//! 2. **Settings**: `max_in_flight` and queue sizes are non-zero, executors exist
//! 3. **Streams**: every stream has exactly one producer and every consumed
//!    stream is produced, either by a node output or as a graph input
//! 4. **Side packets**: at most one producer each, and every consumed side
//!    packet is provided by a node or by the host
//! 5. **Back edges**: each names a bound input port
//! 6. **Cycles**: DFS over node adjacency, ignoring back-edge ports
//!
//! Errors are accumulated so the caller sees every problem at once. Cycle
//! detection is skipped if anything else failed, because it needs a
//! well-formed stream map.
//!
//! Checks that depend on node contracts (port names, payload types) run when
//! the graph is initialized, in `engine::topology`.
//!
//! # Example
//! ```
//! use streamgraph::config::{validate_graph_config, GraphConfig, NodeConfig};
//! use streamgraph::errors::ValidationError;
//!
//! let config = GraphConfig {
//!     nodes: vec![NodeConfig::new("sink", "packet_collector").input("in", "nowhere")],
//!     ..GraphConfig::default()
//! };
//!
//! let errors = validate_graph_config(&config).unwrap_err();
//! assert!(matches!(errors[0], ValidationError::UnproducedStream { .. }));
//! ```

use std::collections::{BTreeMap, HashSet};

use crate::config::consts::{
    DEFAULT_EXECUTOR_NAME, GRAPH_INPUT_PRODUCER, GRAPH_SIDE_PACKET_PRODUCER,
};
use crate::config::{DependencyGraph, GraphConfig};
use crate::errors::ValidationError;
use crate::observability::messages::validation::CyclicDependencyDetected;
use crate::observability::messages::StructuredLog;

/// Validates a graph description, returning every problem found.
pub fn validate_graph_config(config: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    errors.extend(validate_unique_node_ids(config));
    errors.extend(validate_executors(config));
    errors.extend(validate_settings(config));
    errors.extend(validate_streams(config));
    errors.extend(validate_side_packets(config));
    errors.extend(validate_back_edges(config));

    if errors.is_empty() {
        if let Some(cycle) = DependencyGraph::from_config(config).find_cycle() {
            CyclicDependencyDetected { cycle: &cycle }.log();
            errors.push(ValidationError::CyclicDependency { cycle });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_unique_node_ids(config: &GraphConfig) -> Vec<ValidationError> {
    let mut seen_ids = HashSet::new();
    config
        .nodes
        .iter()
        .filter(|node| !seen_ids.insert(node.id.as_str()))
        .map(|node| ValidationError::DuplicateNodeId {
            node_id: node.id.clone(),
        })
        .collect()
}

fn validate_executors(config: &GraphConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut names = HashSet::from([DEFAULT_EXECUTOR_NAME]);

    for executor in &config.executors {
        if !names.insert(executor.name.as_str()) {
            errors.push(ValidationError::DuplicateExecutor {
                executor: executor.name.clone(),
            });
        }
        if executor.num_threads == Some(0) {
            errors.push(ValidationError::InvalidSetting {
                owner: executor.name.clone(),
                reason: "num_threads must be at least 1".to_string(),
            });
        }
    }

    for node in &config.nodes {
        if let Some(executor) = &node.executor {
            if !names.contains(executor.as_str()) {
                errors.push(ValidationError::UnknownExecutor {
                    node_id: node.id.clone(),
                    executor: executor.clone(),
                });
            }
        }
    }

    errors
}

fn validate_settings(config: &GraphConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.num_threads == Some(0) {
        errors.push(ValidationError::InvalidSetting {
            owner: DEFAULT_EXECUTOR_NAME.to_string(),
            reason: "num_threads must be at least 1".to_string(),
        });
    }
    if config.max_queue_size == Some(0) {
        errors.push(ValidationError::InvalidSetting {
            owner: "graph".to_string(),
            reason: "max_queue_size must be at least 1".to_string(),
        });
    }
    for stream in &config.streams {
        if stream.max_queue_size == Some(0) {
            errors.push(ValidationError::InvalidSetting {
                owner: stream.name.clone(),
                reason: "max_queue_size must be at least 1".to_string(),
            });
        }
    }
    for node in &config.nodes {
        if node.max_in_flight == Some(0) {
            errors.push(ValidationError::InvalidSetting {
                owner: node.id.clone(),
                reason: "max_in_flight must be at least 1".to_string(),
            });
        }
    }

    errors
}

fn validate_streams(config: &GraphConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut producers: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for stream in &config.input_streams {
        producers
            .entry(stream.as_str())
            .or_default()
            .push(GRAPH_INPUT_PRODUCER.to_string());
    }
    for node in &config.nodes {
        for stream in node.outputs.values() {
            producers.entry(stream.as_str()).or_default().push(node.id.clone());
        }
    }

    for (stream, stream_producers) in &producers {
        if stream_producers.len() > 1 {
            errors.push(ValidationError::MultipleProducers {
                stream: stream.to_string(),
                producers: stream_producers.clone(),
            });
        }
    }

    for node in &config.nodes {
        for stream in node.inputs.values() {
            if !producers.contains_key(stream.as_str()) {
                errors.push(ValidationError::UnproducedStream {
                    node_id: node.id.clone(),
                    stream: stream.clone(),
                });
            }
        }
    }

    for stream in &config.output_streams {
        if !producers.contains_key(stream.as_str()) {
            errors.push(ValidationError::UnproducedGraphOutput {
                stream: stream.clone(),
            });
        }
    }

    errors
}

fn validate_side_packets(config: &GraphConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut producers: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for name in &config.input_side_packets {
        producers
            .entry(name.as_str())
            .or_default()
            .push(GRAPH_SIDE_PACKET_PRODUCER.to_string());
    }
    for node in &config.nodes {
        for name in node.output_side_packets.values() {
            producers.entry(name.as_str()).or_default().push(node.id.clone());
        }
    }

    for (name, side_producers) in &producers {
        if side_producers.len() > 1 {
            errors.push(ValidationError::MultipleSidePacketProducers {
                side_packet: name.to_string(),
                producers: side_producers.clone(),
            });
        }
    }

    for node in &config.nodes {
        for name in node.input_side_packets.values() {
            if !producers.contains_key(name.as_str()) {
                errors.push(ValidationError::UnprovidedSidePacket {
                    node_id: node.id.clone(),
                    side_packet: name.clone(),
                });
            }
        }
    }

    errors
}

fn validate_back_edges(config: &GraphConfig) -> Vec<ValidationError> {
    config
        .nodes
        .iter()
        .flat_map(|node| {
            node.back_edges
                .iter()
                .filter(|port| !node.inputs.contains_key(port.as_str()))
                .map(|port| ValidationError::InvalidBackEdge {
                    node_id: node.id.clone(),
                    port: port.clone(),
                })
        })
        .collect()
}
