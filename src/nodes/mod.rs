// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in node kinds available in [`NodeRegistry::with_builtin_nodes`].
//!
//! | kind | ports | options |
//! |---|---|---|
//! | `pass_through` | `in` -> `out` (any) | |
//! | `text_case` | `in` -> `out` (text), side packet `prefix` | `mode`: upper, lower, proper, title |
//! | `counter_source` | `out` (int) | `count`, `start`, `interval` |
//! | `timestamp_shift` | `in` -> `out` (any) | `offset` (>= 0) |
//! | `packet_collector` | `in` (any) -> `count` (int), side packet `total` | |

use std::sync::Arc;

use crate::config::NodeRegistry;
use crate::traits::Node;

mod counter_source;
mod packet_collector;
mod pass_through;
#[cfg(test)]
pub(crate) mod stub;
mod text_case;
mod timestamp_shift;

pub use counter_source::CounterSourceNode;
pub use packet_collector::PacketCollectorNode;
pub use pass_through::PassThroughNode;
pub use text_case::{CaseMode, TextCaseNode};
pub use timestamp_shift::TimestampShiftNode;

/// Adds every built-in kind to `registry`.
pub fn register_builtin_nodes(registry: &mut NodeRegistry) {
    registry
        .register("pass_through", |_| Ok(Arc::new(PassThroughNode::new()) as Arc<dyn Node>))
        .register("text_case", |config| {
            TextCaseNode::from_config(config).map(|node| Arc::new(node) as Arc<dyn Node>)
        })
        .register("counter_source", |config| {
            CounterSourceNode::from_config(config).map(|node| Arc::new(node) as Arc<dyn Node>)
        })
        .register("timestamp_shift", |config| {
            TimestampShiftNode::from_config(config).map(|node| Arc::new(node) as Arc<dyn Node>)
        })
        .register("packet_collector", |_| {
            Ok(Arc::new(PacketCollectorNode::new()) as Arc<dyn Node>)
        });
}
