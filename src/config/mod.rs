// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod dependency_graph;
mod loader;
mod registry;
mod validation;

pub mod consts;

pub use dependency_graph::DependencyGraph;
pub use loader::{
    load_and_validate_config, load_config, parse_toml, parse_yaml, ExecutorConfig, GraphConfig,
    NodeConfig, OverflowPolicy, StreamConfig,
};
pub use registry::{NodeFactory, NodeRegistry};
pub use validation::validate_graph_config;
