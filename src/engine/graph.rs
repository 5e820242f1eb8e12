// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::config::{load_config, GraphConfig, NodeRegistry};
use crate::engine::executor::ThreadPoolExecutor;
use crate::engine::node_runner::NodeRuntime;
use crate::engine::policies::policy_for;
use crate::engine::poller::OutputStreamPoller;
use crate::engine::scheduler::RunState;
use crate::engine::side_packets::SidePacketSlot;
use crate::engine::stream::{SendError, StreamRuntime};
use crate::engine::topology::Topology;
use crate::errors::{GraphConfigError, GraphError, NodeError, NodePhase, UsageError};
use crate::observability::messages::engine::{GraphInitialized, InputStreamClosed, RunStarted};
use crate::observability::messages::StructuredLog;
use crate::packet::{Packet, Timestamp};

/// Lifecycle state reported by [`Graph::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Created, no graph description yet.
    Built,
    /// Description validated; no run started.
    Initialized,
    Running,
    /// A run is active and no node task is queued or running.
    Idle,
    /// Every node of the last run is closed.
    Done,
    /// The last run failed or was cancelled by the host.
    Cancelled,
    Destroyed,
}

impl Display for GraphState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GraphState::Built => "built",
            GraphState::Initialized => "initialized",
            GraphState::Running => "running",
            GraphState::Idle => "idle",
            GraphState::Done => "done",
            GraphState::Cancelled => "cancelled",
            GraphState::Destroyed => "destroyed",
        };
        write!(f, "{}", name)
    }
}

/// A dataflow graph and the API that drives it.
///
/// ```
/// use std::collections::HashMap;
/// use streamgraph::config::{parse_yaml, NodeRegistry};
/// use streamgraph::engine::Graph;
/// use streamgraph::packet::{Packet, Timestamp};
///
/// let config = parse_yaml(r#"
/// input_streams: [text]
/// output_streams: [shouted]
/// nodes:
///   - id: upper
///     kind: text_case
///     inputs: { in: text }
///     outputs: { out: shouted }
///     options: { mode: upper }
/// "#).unwrap();
///
/// let mut graph = Graph::new(NodeRegistry::with_builtin_nodes());
/// graph.initialize(config).unwrap();
/// let mut poller = graph.add_output_stream_poller("shouted").unwrap();
///
/// graph.start_run(HashMap::new()).unwrap();
/// graph.add_packet_to_input_stream("text", Packet::new("hello").at(Timestamp::new(1))).unwrap();
/// graph.close_all_input_streams().unwrap();
/// graph.wait_until_done().unwrap();
///
/// let packet = poller.next().unwrap();
/// assert_eq!(packet.get::<String>().unwrap(), "HELLO");
/// assert!(poller.next().is_none());
/// ```
pub struct Graph {
    registry: NodeRegistry,
    topology: Option<Arc<Topology>>,
    executors: Vec<ThreadPoolExecutor>,
    run: Option<Arc<RunState>>,
    pending_pollers: Vec<(usize, UnboundedSender<Packet>)>,
    next_run_id: u64,
    destroyed: bool,
}

impl Graph {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            registry,
            topology: None,
            executors: Vec::new(),
            run: None,
            pending_pollers: Vec::new(),
            next_run_id: 1,
            destroyed: false,
        }
    }

    /// Validates `config` and fixes the graph's topology. Nothing is kept if
    /// validation fails.
    pub fn initialize(&mut self, config: GraphConfig) -> Result<(), GraphConfigError> {
        if self.topology.is_some() || self.destroyed {
            return Err(GraphConfigError::AlreadyInitialized);
        }

        let topology = Topology::build(&config, &self.registry)?;
        GraphInitialized {
            node_count: topology.nodes.len(),
            stream_count: topology.streams.len(),
            executor_count: topology.executors.len(),
        }
        .log();
        self.topology = Some(Arc::new(topology));
        Ok(())
    }

    pub fn initialize_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), GraphConfigError> {
        let config = load_config(path)?;
        self.initialize(config)
    }

    pub fn state(&self) -> GraphState {
        if self.destroyed {
            return GraphState::Destroyed;
        }
        match (&self.topology, &self.run) {
            (None, _) => GraphState::Built,
            (Some(_), None) => GraphState::Initialized,
            (Some(_), Some(run)) if run.is_cancelled() => GraphState::Cancelled,
            (Some(_), Some(run)) if run.is_done() => GraphState::Done,
            (Some(_), Some(run)) if run.is_idle() => GraphState::Idle,
            (Some(_), Some(_)) => GraphState::Running,
        }
    }

    /// True when the current run has already failed.
    pub fn has_error(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| run.first_error().is_some())
    }

    /// Registers a poller for `stream`. Pollers attach to the next run and
    /// must be added before `start_run`.
    pub fn add_output_stream_poller(&mut self, stream: &str) -> Result<OutputStreamPoller, GraphError> {
        let topology = self.topology_for("add_output_stream_poller")?;
        if self.run_is_active() {
            return Err(UsageError::PollerAfterStart(stream.to_string()).into());
        }
        let index = topology
            .stream_index(stream)
            .ok_or_else(|| UsageError::UnknownStream(stream.to_string()))?;

        let (sender, receiver) = unbounded_channel();
        self.pending_pollers.push((index, sender));
        Ok(OutputStreamPoller::new(stream, receiver))
    }

    /// Starts a run with the host-supplied side packets.
    ///
    /// Nodes are created fresh from the registry, back-edge inputs are
    /// seeded, and every node is scheduled in topological order.
    pub fn start_run(&mut self, side_packets: HashMap<String, Packet>) -> Result<(), GraphError> {
        let topology = self.topology_for("start_run")?;
        if self.run_is_active() {
            return Err(self.invalid_state("start_run"));
        }

        for (name, packet) in &side_packets {
            let Some(&slot) = topology.host_side_packets.get(name) else {
                return Err(UsageError::UnexpectedSidePacket(name.clone()).into());
            };
            let spec = &topology.side_packets[slot];
            if let Some(payload) = packet.payload() {
                if !spec.payload_type.accepts(payload) {
                    return Err(UsageError::TypeMismatch {
                        stream: name.clone(),
                        declared: spec.payload_type.to_string(),
                        actual: payload.type_name().to_string(),
                    }
                    .into());
                }
            }
        }
        for (name, &slot) in &topology.host_side_packets {
            if topology.side_packets[slot].is_required() && !side_packets.contains_key(name) {
                return Err(UsageError::MissingSidePacket(name.clone()).into());
            }
        }

        if self.executors.is_empty() {
            self.executors = topology
                .executors
                .iter()
                .map(|spec| ThreadPoolExecutor::new(&spec.name, spec.num_threads))
                .collect::<std::io::Result<Vec<_>>>()
                .map_err(|error| {
                    GraphError::node_failure(
                        "<executor>",
                        NodePhase::Open,
                        Timestamp::UNSET,
                        NodeError::Failed(error.to_string()),
                    )
                })?;
        }
        let handles = self
            .executors
            .iter()
            .map(ThreadPoolExecutor::handle)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.invalid_state("start_run"))?;

        let mut nodes = Vec::with_capacity(topology.nodes.len());
        for (index, spec) in topology.nodes.iter().enumerate() {
            let node = self.registry.create(&spec.config).map_err(|error| {
                GraphError::node_failure(
                    spec.id(),
                    NodePhase::Open,
                    Timestamp::UNSET,
                    NodeError::Failed(error.to_string()),
                )
            })?;
            let policy = spec
                .config
                .input_policy
                .map(policy_for)
                .or_else(|| node.input_policy())
                .unwrap_or_else(|| policy_for(spec.contract.input_policy));
            let capacities: Vec<_> = spec
                .inputs
                .iter()
                .map(|binding| topology.streams[binding.stream].capacity)
                .collect();
            nodes.push(NodeRuntime::new(index, spec, node, policy, &capacities));
        }

        let mut pollers: Vec<Vec<UnboundedSender<Packet>>> = vec![Vec::new(); topology.streams.len()];
        for (index, sender) in self.pending_pollers.drain(..) {
            pollers[index].push(sender);
        }
        let streams = topology
            .streams
            .iter()
            .zip(pollers)
            .map(|(spec, pollers)| StreamRuntime::new(spec, pollers))
            .collect();
        let slots = topology
            .side_packets
            .iter()
            .map(|spec| SidePacketSlot::new(&spec.name))
            .collect();

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let run = RunState::new(run_id, Arc::clone(&topology), nodes, streams, slots, handles);

        for node in &run.nodes {
            node.seed_back_edges();
        }
        for (name, &slot) in &topology.host_side_packets {
            match side_packets.get(name) {
                Some(packet) => {
                    // slots are fresh, so the write cannot collide
                    let _ = run.side_packets[slot].set(packet.clone());
                }
                None => {
                    run.side_packets[slot].mark_absent();
                }
            }
        }

        RunStarted {
            run_id,
            node_count: run.nodes.len(),
            side_packet_count: side_packets.len(),
        }
        .log();

        let mut order: Vec<usize> = (0..topology.nodes.len()).collect();
        order.sort_by_key(|&index| topology.nodes[index].level);
        for index in order {
            run.schedule(index);
        }
        run.settle();

        self.run = Some(run);
        Ok(())
    }

    /// Feeds one packet into a graph input stream. Timestamps on a graph
    /// input must strictly increase. Blocks while a bounded consumer queue
    /// under the `block` policy is full.
    pub fn add_packet_to_input_stream(&self, stream: &str, packet: Packet) -> Result<(), GraphError> {
        let (run, index) = self.input_stream("add_packet_to_input_stream", stream)?;
        let runtime = &run.streams[index];

        if let Some(payload) = packet.payload() {
            if !runtime.payload_type.accepts(payload) {
                return Err(UsageError::TypeMismatch {
                    stream: stream.to_string(),
                    declared: runtime.payload_type.to_string(),
                    actual: payload.type_name().to_string(),
                }
                .into());
            }
        }

        let timestamp = packet.timestamp();
        runtime.send(run, packet, true).map_err(|error| match error {
            SendError::Closed => UsageError::StreamAlreadyClosed(stream.to_string()).into(),
            SendError::InvalidTimestamp(timestamp) => UsageError::InvalidTimestamp(timestamp).into(),
            SendError::OutOfOrder { bound, .. } => UsageError::TimestampOutOfOrder {
                stream: stream.to_string(),
                timestamp,
                bound,
            }
            .into(),
            SendError::Overflow { capacity } => UsageError::QueueFull {
                stream: stream.to_string(),
                capacity,
            }
            .into(),
            SendError::Cancelled => self.invalid_state("add_packet_to_input_stream"),
        })
    }

    /// Closes a graph input: its bound becomes `Done` and propagates.
    pub fn close_input_stream(&self, stream: &str) -> Result<(), GraphError> {
        let (run, index) = self.input_stream("close_input_stream", stream)?;
        if !run.streams[index].close(run) {
            return Err(UsageError::StreamAlreadyClosed(stream.to_string()).into());
        }
        InputStreamClosed {
            run_id: run.run_id,
            stream,
        }
        .log();
        run.input_closed();
        Ok(())
    }

    /// Closes every graph input that is still open.
    pub fn close_all_input_streams(&self) -> Result<(), GraphError> {
        let run = self.active_run("close_all_input_streams")?;
        for (name, &index) in &run.topology.input_streams {
            if run.streams[index].close(run) {
                InputStreamClosed {
                    run_id: run.run_id,
                    stream: name,
                }
                .log();
                run.input_closed();
            }
        }
        Ok(())
    }

    /// Blocks until no node task is queued or running. Rejected for graphs
    /// with source nodes, which are never idle.
    pub fn wait_until_idle(&self) -> Result<(), GraphError> {
        let run = self.current_run("wait_until_idle")?;
        if run.topology.has_source_nodes() {
            return Err(UsageError::SourceNodesPresent.into());
        }
        run.wait_until_idle()
    }

    /// Blocks until every node of the current run is closed. Returns the
    /// first node failure of the run, if any.
    pub fn wait_until_done(&self) -> Result<(), GraphError> {
        self.current_run("wait_until_done")?.wait_until_done()
    }

    /// Aborts the current run. Nodes already opened still get `close`.
    pub fn cancel(&self) {
        if let Some(run) = &self.run {
            run.cancel();
        }
    }

    /// Closes every input, stops source nodes, waits for the run to finish
    /// and stops the executors. The graph cannot be used afterwards.
    pub fn close(&mut self) -> Result<(), GraphError> {
        let result = match self.run.take() {
            Some(run) => {
                for (name, &index) in &run.topology.input_streams {
                    if run.streams[index].close(&run) {
                        InputStreamClosed {
                            run_id: run.run_id,
                            stream: name,
                        }
                        .log();
                        run.input_closed();
                    }
                }
                run.close_sources();
                run.wait_until_done()
            }
            None => Ok(()),
        };
        self.shutdown();
        result
    }

    fn shutdown(&mut self) {
        self.pending_pollers.clear();
        for executor in &mut self.executors {
            executor.shutdown();
        }
        self.executors.clear();
        self.destroyed = true;
    }

    fn run_is_active(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.is_done())
    }

    fn invalid_state(&self, operation: &'static str) -> GraphError {
        UsageError::InvalidState {
            operation,
            state: self.state().to_string(),
        }
        .into()
    }

    fn topology_for(&self, operation: &'static str) -> Result<Arc<Topology>, GraphError> {
        match &self.topology {
            Some(topology) if !self.destroyed => Ok(Arc::clone(topology)),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn current_run(&self, operation: &'static str) -> Result<&Arc<RunState>, GraphError> {
        match &self.run {
            Some(run) if !self.destroyed => Ok(run),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn active_run(&self, operation: &'static str) -> Result<&Arc<RunState>, GraphError> {
        match &self.run {
            Some(run) if !run.is_done() && !self.destroyed => Ok(run),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn input_stream(&self, operation: &'static str, stream: &str) -> Result<(&Arc<RunState>, usize), GraphError> {
        let run = self.active_run(operation)?;
        let index = run
            .topology
            .input_streams
            .get(stream)
            .copied()
            .ok_or_else(|| UsageError::UnknownInputStream(stream.to_string()))?;
        Ok((run, index))
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel();
            // the run's outcome has no reader at this point
            let _ = run.wait_until_done();
        }
        self.shutdown();
    }
}
