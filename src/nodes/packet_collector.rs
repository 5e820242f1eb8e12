// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicI64, Ordering};

use crate::engine::NodeContext;
use crate::errors::NodeResult;
use crate::packet::{Packet, PayloadType, Timestamp};
use crate::traits::{Node, NodeContract, ProcessOutcome};

/// Sink that counts the packets it receives. On close it reports the count
/// on the optional `count` output at `PostStream` and as the optional
/// `total` side packet.
#[derive(Debug, Default)]
pub struct PacketCollectorNode {
    received: AtomicI64,
}

impl PacketCollectorNode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for PacketCollectorNode {
    fn contract(&self) -> NodeContract {
        NodeContract::new()
            .input("in", PayloadType::Any)
            .optional_output("count", PayloadType::Int)
            .optional_output_side_packet("total", PayloadType::Int)
    }

    fn open(&self, _cx: &mut NodeContext<'_>) -> NodeResult<()> {
        self.received.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn process(&self, cx: &mut NodeContext<'_>) -> NodeResult<ProcessOutcome> {
        if !cx.has_input("in") {
            return Ok(ProcessOutcome::NoOutput);
        }
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(ProcessOutcome::NoOutput)
    }

    fn close(&self, cx: &mut NodeContext<'_>) -> NodeResult<()> {
        if cx.is_cancelled() {
            return Ok(());
        }
        let total = self.received.load(Ordering::SeqCst);
        cx.send("count", Packet::new(total).at(Timestamp::POST_STREAM))?;
        cx.set_side_packet("total", Packet::new(total))
    }

    fn name(&self) -> &'static str {
        "packet_collector"
    }
}
