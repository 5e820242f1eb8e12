// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Packet and timestamp primitives moved between nodes.

mod packet;
mod timestamp;

pub use packet::{CustomPayload, Packet, Payload, PayloadType};
pub use timestamp::{Timestamp, TimestampDiff};
