pub mod input_policy;
pub mod node;

pub use input_policy::{InputPolicy, InputPolicyKind, InputState, Readiness};
pub use node::{Node, NodeContract, PortSpec, ProcessOutcome};
