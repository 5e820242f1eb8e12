// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::NodeConfig;
use crate::engine::NodeContext;
use crate::errors::NodeResult;
use crate::packet::{PayloadType, TimestampDiff};
use crate::traits::{Node, NodeContract, ProcessOutcome};

/// Re-stamps every packet `offset` ticks later. Negative offsets would let
/// outputs run behind the input timestamp and are rejected.
#[derive(Debug, Clone)]
pub struct TimestampShiftNode {
    offset: TimestampDiff,
}

impl TimestampShiftNode {
    pub fn new(offset: i64) -> Self {
        Self {
            offset: TimestampDiff(offset),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Result<Self, String> {
        let offset = config.option_i64("offset").unwrap_or(0);
        if offset < 0 {
            return Err(format!("offset must not be negative, got {}", offset));
        }
        Ok(Self::new(offset))
    }
}

impl Node for TimestampShiftNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .output("out", PayloadType::Any)
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        let packet = cx.input("in")?;
        if packet.is_empty() {
            return Ok(ProcessOutcome::NoOutput);
        }
        let shifted = packet.at(packet.timestamp().offset(self.offset));
        cx.send("out", shifted)?;
        Ok(ProcessOutcome::Processed)
    }

    fn name(&self) -> &'static str {
        "timestamp_shift"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_offset_rejected() {
        let config = NodeConfig::new("s", "timestamp_shift").with_option("offset", -3);
        assert!(TimestampShiftNode::from_config(&config).is_err());

        let config = NodeConfig::new("s", "timestamp_shift").with_option("offset", 3);
        assert_eq!(TimestampShiftNode::from_config(&config).unwrap().offset, TimestampDiff(3));
    }
}
