/// Concurrent invocations allowed per node unless the contract or graph says otherwise
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1;
/// Name of the executor that services every node without an explicit executor
pub const DEFAULT_EXECUTOR_NAME: &str = "default";
/// Worker count used when the available parallelism cannot be detected
pub const FALLBACK_THREAD_COUNT: usize = 4;
/// Producer label used in diagnostics for streams fed by the host
pub const GRAPH_INPUT_PRODUCER: &str = "<graph input>";
/// Producer label used in diagnostics for side packets supplied to start_run
pub const GRAPH_SIDE_PACKET_PRODUCER: &str = "<graph side packet>";
