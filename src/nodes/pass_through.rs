// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::NodeContext;
use crate::errors::NodeResult;
use crate::packet::PayloadType;
use crate::traits::{Node, NodeContract, ProcessOutcome};

/// Forwards every packet unchanged.
#[derive(Debug, Default)]
pub struct PassThroughNode;

impl PassThroughNode {
    pub fn new() -> Self {
        Self
    }
}

impl Node for PassThroughNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .output("out", PayloadType::Any)
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        let packet = cx.input("in")?.clone();
        if packet.is_empty() {
            return Ok(ProcessOutcome::NoOutput);
        }
        cx.send("out", packet)?;
        Ok(ProcessOutcome::Processed)
    }

    fn name(&self) -> &'static str {
        "pass_through"
    }
}
