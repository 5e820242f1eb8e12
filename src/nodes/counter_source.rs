// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicI64, Ordering};

use crate::config::NodeConfig;
use crate::engine::NodeContext;
use crate::errors::NodeResult;
use crate::packet::{Packet, PayloadType, Timestamp};
use crate::traits::{Node, NodeContract, ProcessOutcome};

const DEFAULT_COUNT: i64 = 10;

/// Source node emitting `count` integers `0..count`, the `n`th at timestamp
/// `start + n * interval`, then stopping.
#[derive(Debug)]
pub struct CounterSourceNode {
    count: i64,
    start: i64,
    interval: i64,
    emitted: AtomicI64,
}

impl CounterSourceNode {
    pub fn new(count: i64, start: i64, interval: i64) -> Self {
        Self {
            count,
            start,
            interval,
            emitted: AtomicI64::new(0),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Result<Self, String> {
        let count = config.option_i64("count").unwrap_or(DEFAULT_COUNT);
        let start = config.option_i64("start").unwrap_or(0);
        let interval = config.option_i64("interval").unwrap_or(1);

        if count < 0 {
            return Err(format!("count must not be negative, got {}", count));
        }
        if interval <= 0 {
            return Err(format!("interval must be positive, got {}", interval));
        }
        Ok(Self::new(count, start, interval))
    }
}

impl Node for CounterSourceNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new().output("out", PayloadType::Int)
    }

    fn open(&self, _cx: &mut NodeContext<'_>) -> NodeResult<()> {
        self.emitted.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        let n = self.emitted.fetch_add(1, Ordering::SeqCst);
        if n >= self.count {
            return Ok(ProcessOutcome::Stop);
        }

        let timestamp = Timestamp::new(self.start.saturating_add(n.saturating_mul(self.interval)));
        cx.send("out", Packet::new(n).at(timestamp))?;
        cx.set_next_timestamp_bound("out", timestamp.next_allowed_in_stream())?;

        if n + 1 == self.count {
            Ok(ProcessOutcome::Stop)
        } else {
            Ok(ProcessOutcome::Processed)
        }
    }

    fn name(&self) -> &'static str {
        "counter_source"
    }
}
