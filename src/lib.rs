// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // graph descriptions + node registry
pub mod engine;     // scheduler, streams and the Graph API
pub mod errors;     // error handling
pub mod nodes;      // built-in node kinds
pub mod observability;
pub mod packet;     // packets and timestamps
pub mod traits;     // node and input policy contracts
