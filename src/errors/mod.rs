// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod node;

pub use config::{GraphConfigError, ValidationError};
pub use execution::{GraphError, NodePhase, UsageError};
pub use node::{NodeError, NodeResult, PacketError};
