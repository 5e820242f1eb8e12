// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph execution: streams, input policies, node runners, the scheduler and
//! the [`Graph`] driving API.

mod context;
mod executor;
mod graph;
mod input_queue;
mod node_runner;
mod policies;
mod poller;
mod scheduler;
mod side_packets;
mod stream;
mod topology;


use std::sync::{Mutex, MutexGuard, PoisonError};

pub use context::NodeContext;
pub use graph::{Graph, GraphState};
pub use policies::{policy_for, ImmediatePolicy, SynchronizedPolicy};
pub use poller::OutputStreamPoller;

/// Locks `mutex`, recovering the guard if a node panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
