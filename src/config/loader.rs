// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::config::consts::FALLBACK_THREAD_COUNT;
use crate::errors::GraphConfigError;
use crate::traits::InputPolicyKind;

/// Declarative description of a dataflow graph.
///
/// This struct is the complete input of `Graph::initialize`: the nodes, the
/// stream names that connect them, the graph-level inputs and outputs, and the
/// executor pools nodes are bound to. It is typically loaded from YAML.
///
/// # Example
/// ```yaml
/// input_streams: [text_in]
/// output_streams: [text_out]
/// max_queue_size: 8
/// executors:
///   - name: slow
///     num_threads: 1
/// nodes:
///   - id: upper
///     kind: text_case
///     inputs: { in: text_in }
///     outputs: { out: text_out }
///     executor: slow
///     options:
///       mode: upper
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub input_streams: Vec<String>,
    #[serde(default)]
    pub output_streams: Vec<String>,
    #[serde(default)]
    pub input_side_packets: Vec<String>,
    /// Default queue depth for every edge; `None` means unbounded.
    #[serde(default)]
    pub max_queue_size: Option<usize>,
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
    /// Worker threads of the default executor; `None` means one per CPU.
    #[serde(default)]
    pub num_threads: Option<usize>,
    #[serde(default)]
    pub executors: Vec<ExecutorConfig>,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
    pub nodes: Vec<NodeConfig>,
}

impl GraphConfig {
    /// Thread count of the default executor.
    pub fn default_thread_count(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(FALLBACK_THREAD_COUNT)
        })
    }

    /// Effective queue depth and overflow policy of a stream.
    pub fn stream_settings(&self, stream: &str) -> (Option<usize>, OverflowPolicy) {
        match self.streams.iter().find(|s| s.name == stream) {
            Some(settings) => (
                settings.max_queue_size.or(self.max_queue_size),
                settings.overflow_policy.unwrap_or(self.overflow_policy),
            ),
            None => (self.max_queue_size, self.overflow_policy),
        }
    }
}

/// A named worker pool that nodes can be bound to.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    pub name: String,
    #[serde(default)]
    pub num_threads: Option<usize>,
}

/// Per-stream queue settings overriding the graph defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    #[serde(default)]
    pub max_queue_size: Option<usize>,
    #[serde(default)]
    pub overflow_policy: Option<OverflowPolicy>,
}

/// What happens when a packet is sent to a full queue.
///
/// # Variants
/// * `Block` - The sender waits until the consumer drains a packet
/// * `DropOldest` - The oldest queued packet is discarded
/// * `Error` - The send fails; from a node this fails the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Block,
    DropOldest,
    Error,
}

/// Configuration for a single node.
///
/// Port bindings map the port names of the node contract to stream names.
/// Two bindings that use the same stream name are connected.
///
/// # Example
/// ```yaml
/// id: detector
/// kind: pass_through
/// inputs: { in: frames, loop: feedback }
/// outputs: { out: detections }
/// back_edges: [loop]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub input_side_packets: BTreeMap<String, String>,
    #[serde(default)]
    pub output_side_packets: BTreeMap<String, String>,
    #[serde(default)]
    pub executor: Option<String>,
    #[serde(default)]
    pub input_policy: Option<InputPolicyKind>,
    #[serde(default)]
    pub max_in_flight: Option<usize>,
    /// Input ports that close a sanctioned cycle
    #[serde(default)]
    pub back_edges: Vec<String>,
    #[serde(default)]
    pub options: HashMap<String, serde_yaml::Value>, // node-specific options
}

impl NodeConfig {
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            input_side_packets: BTreeMap::new(),
            output_side_packets: BTreeMap::new(),
            executor: None,
            input_policy: None,
            max_in_flight: None,
            back_edges: Vec::new(),
            options: HashMap::new(),
        }
    }

    pub fn input(mut self, port: &str, stream: &str) -> Self {
        self.inputs.insert(port.to_string(), stream.to_string());
        self
    }

    pub fn output(mut self, port: &str, stream: &str) -> Self {
        self.outputs.insert(port.to_string(), stream.to_string());
        self
    }

    pub fn input_side_packet(mut self, port: &str, name: &str) -> Self {
        self.input_side_packets.insert(port.to_string(), name.to_string());
        self
    }

    pub fn output_side_packet(mut self, port: &str, name: &str) -> Self {
        self.output_side_packets.insert(port.to_string(), name.to_string());
        self
    }

    pub fn back_edge(mut self, port: &str) -> Self {
        self.back_edges.push(port.to_string());
        self
    }

    pub fn on_executor(mut self, executor: &str) -> Self {
        self.executor = Some(executor.to_string());
        self
    }

    pub fn with_policy(mut self, policy: InputPolicyKind) -> Self {
        self.input_policy = Some(policy);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    pub fn with_option(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    pub fn option_i64(&self, key: &str) -> Option<i64> {
        self.options.get(key).and_then(|v| v.as_i64())
    }
}

/// Parse a graph description from YAML text
pub fn parse_yaml(content: &str) -> Result<GraphConfig, GraphConfigError> {
    serde_yaml::from_str(content).map_err(|e| GraphConfigError::Parse(e.to_string()))
}

/// Parse a graph description from TOML text
pub fn parse_toml(content: &str) -> Result<GraphConfig, GraphConfigError> {
    toml::from_str(content).map_err(|e| GraphConfigError::Parse(e.to_string()))
}

/// Load a graph description from a `.yaml`/`.yml` or `.toml` file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GraphConfig, GraphConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| GraphConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => parse_toml(&content),
        _ => parse_yaml(&content),
    }
}

/// Load a graph description and validate its name-level structure
///
/// Contract-level checks (ports, payload types) need node instances and run
/// in `Graph::initialize`.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<GraphConfig, GraphConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_graph_config(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
input_streams: [frames]
output_streams: [out]
nodes:
  - id: pass
    kind: pass_through
    inputs: { in: frames }
    outputs: { out: out }
"#;

        let cfg = parse_yaml(yaml).unwrap();
        assert_eq!(cfg.input_streams, vec!["frames"]);
        assert_eq!(cfg.nodes.len(), 1);
        assert_eq!(cfg.nodes[0].inputs.get("in").map(String::as_str), Some("frames"));
        assert_eq!(cfg.overflow_policy, OverflowPolicy::Block);
        assert!(cfg.max_queue_size.is_none());
    }

    #[test]
    fn test_parse_node_with_options_and_policy() {
        let yaml = r#"
nodes:
  - id: upper
    kind: text_case
    input_policy: immediate
    max_in_flight: 3
    back_edges: [loop]
    options:
      mode: upper
      repeat: 2
"#;

        let cfg = parse_yaml(yaml).unwrap();
        let node = &cfg.nodes[0];
        assert_eq!(node.input_policy, Some(InputPolicyKind::Immediate));
        assert_eq!(node.max_in_flight, Some(3));
        assert_eq!(node.back_edges, vec!["loop"]);
        assert_eq!(node.option_str("mode"), Some("upper"));
        assert_eq!(node.option_i64("repeat"), Some(2));
    }

    #[test]
    fn test_stream_settings_override_defaults() {
        let yaml = r#"
max_queue_size: 8
overflow_policy: error
streams:
  - name: narrow
    max_queue_size: 2
    overflow_policy: drop_oldest
  - name: deep
    max_queue_size: 64
nodes: []
"#;

        let cfg = parse_yaml(yaml).unwrap();
        assert_eq!(cfg.stream_settings("narrow"), (Some(2), OverflowPolicy::DropOldest));
        assert_eq!(cfg.stream_settings("deep"), (Some(64), OverflowPolicy::Error));
        assert_eq!(cfg.stream_settings("other"), (Some(8), OverflowPolicy::Error));
    }

    #[test]
    fn test_parse_toml() {
        let toml_text = r#"
input_streams = ["in"]
num_threads = 2

[[executors]]
name = "io"
num_threads = 1

[[nodes]]
id = "pass"
kind = "pass_through"
executor = "io"
inputs = { in = "in" }
outputs = { out = "out" }
"#;

        let cfg = parse_toml(toml_text).unwrap();
        assert_eq!(cfg.default_thread_count(), 2);
        assert_eq!(cfg.executors[0].name, "io");
        assert_eq!(cfg.nodes[0].executor.as_deref(), Some("io"));
    }

    #[test]
    fn test_load_config_by_extension() {
        let mut yaml_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml_file, "nodes:\n  - id: a\n    kind: pass_through").unwrap();
        assert_eq!(load_config(yaml_file.path()).unwrap().nodes[0].id, "a");

        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "[[nodes]]\nid = \"b\"\nkind = \"pass_through\"").unwrap();
        assert_eq!(load_config(toml_file.path()).unwrap().nodes[0].id, "b");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/definitely/not/here.yaml");
        assert!(matches!(result, Err(GraphConfigError::Io { .. })));
    }

    #[test]
    fn test_parse_error() {
        let result = parse_yaml("nodes: [ {id: 1, kind: ");
        assert!(matches!(result, Err(GraphConfigError::Parse(_))));
    }
}
