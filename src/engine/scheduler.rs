// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared state of one run and the task scheduling built on it.
//!
//! Every node has at most one queued task at a time. A task evaluates the
//! node once (open, invoke, close or nothing) and anything that may have made
//! a node runnable schedules it again: a packet arriving, a bound moving, a
//! side packet resolving, queue space freeing up, or cancellation.

use crossbeam_channel::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::engine::executor::Job;
use crate::engine::lock;
use crate::engine::node_runner::{run_task, NodeRuntime};
use crate::engine::side_packets::SidePacketSlot;
use crate::engine::stream::StreamRuntime;
use crate::engine::topology::Topology;
use crate::errors::GraphError;
use crate::observability::messages::engine::{RunCancelled, RunCompleted, RunFailed};
use crate::observability::messages::StructuredLog;

#[derive(Debug, Default)]
struct Progress {
    /// Tasks queued or running.
    pending: usize,
    closed_nodes: usize,
    closed_inputs: usize,
    done: bool,
}

pub(crate) struct RunState {
    pub run_id: u64,
    pub topology: Arc<Topology>,
    pub nodes: Vec<NodeRuntime>,
    pub streams: Vec<StreamRuntime>,
    pub side_packets: Vec<SidePacketSlot>,
    executors: Vec<Sender<Job>>,
    cancel: CancellationToken,
    first_error: Mutex<Option<GraphError>>,
    progress: Mutex<Progress>,
    progress_changed: Condvar,
    started: Instant,
    me: Weak<RunState>,
}

impl RunState {
    pub fn new(
        run_id: u64,
        topology: Arc<Topology>,
        nodes: Vec<NodeRuntime>,
        streams: Vec<StreamRuntime>,
        side_packets: Vec<SidePacketSlot>,
        executors: Vec<Sender<Job>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            run_id,
            topology,
            nodes,
            streams,
            side_packets,
            executors,
            cancel: CancellationToken::new(),
            first_error: Mutex::new(None),
            progress: Mutex::new(Progress::default()),
            progress_changed: Condvar::new(),
            started: Instant::now(),
            me: me.clone(),
        })
    }

    fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        lock(&self.progress)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Queues a task for `index` on its executor unless one is already queued.
    pub fn schedule(&self, index: usize) {
        let node = &self.nodes[index];
        if !node.mark_queued() {
            return;
        }
        let Some(run) = self.me.upgrade() else {
            node.unmark_queued();
            return;
        };

        self.lock_progress().pending += 1;
        let job: Job = Box::new(move || {
            run_task(&run, index);
            run.task_finished();
        });

        if self.executors[node.executor].send(job).is_err() {
            node.unmark_queued();
            self.task_finished();
        }
    }

    fn task_finished(&self) {
        let mut progress = self.lock_progress();
        progress.pending -= 1;
        self.progress_changed.notify_all();
    }

    /// Records the run's first error and cancels it. Later errors are
    /// consequences of the cancellation and are only logged.
    pub fn fail(&self, error: GraphError) {
        {
            let mut first_error = lock(&self.first_error);
            let first = first_error.is_none();
            RunFailed {
                run_id: self.run_id,
                error: &error,
                first,
            }
            .log();
            if first {
                *first_error = Some(error);
            }
        }
        self.cancel();
    }

    /// Aborts the run: blocked senders are released, every stream closes and
    /// every node is driven to `Closed`.
    pub fn cancel(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        RunCancelled { run_id: self.run_id }.log();

        for node in &self.nodes {
            node.wake_senders();
        }
        for stream in &self.streams {
            stream.close(self);
        }
        for index in 0..self.nodes.len() {
            self.schedule(index);
        }

        let mut progress = self.lock_progress();
        progress.closed_inputs = self.topology.input_streams.len();
        self.check_done(&mut progress);
    }

    /// Stops every source node so its outputs reach `Done` and the
    /// downstream nodes drain and close normally.
    pub fn close_sources(&self) {
        for node in self.nodes.iter().filter(|node| node.is_source()) {
            node.request_stop();
            self.schedule(node.index);
        }
    }

    pub fn node_closed(&self) {
        let mut progress = self.lock_progress();
        progress.closed_nodes += 1;
        self.check_done(&mut progress);
    }

    pub fn input_closed(&self) {
        let mut progress = self.lock_progress();
        progress.closed_inputs += 1;
        self.check_done(&mut progress);
    }

    /// Marks the run done once every node and every graph input is closed.
    fn check_done(&self, progress: &mut Progress) {
        if !progress.done
            && progress.closed_nodes >= self.nodes.len()
            && progress.closed_inputs >= self.topology.input_streams.len()
        {
            progress.done = true;
            RunCompleted {
                run_id: self.run_id,
                node_count: self.nodes.len(),
                duration: self.started.elapsed(),
                failed: lock(&self.first_error).is_some(),
            }
            .log();
        }
        self.progress_changed.notify_all();
    }

    /// Re-evaluates a run with nothing to schedule, e.g. zero nodes.
    pub fn settle(&self) {
        let mut progress = self.lock_progress();
        self.check_done(&mut progress);
    }

    pub fn schedule_side_packet_consumers(&self, slot: usize) {
        for consumer in &self.topology.side_packets[slot].consumers {
            self.schedule(consumer.node);
        }
    }

    /// Blocks until no task is queued or running, or the run is done.
    pub fn wait_until_idle(&self) -> Result<(), GraphError> {
        let mut progress = self.lock_progress();
        while progress.pending > 0 && !progress.done {
            progress = self
                .progress_changed
                .wait(progress)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        drop(progress);
        self.first_error().map_or(Ok(()), Err)
    }

    /// Blocks until every node closed and every in-flight task returned.
    pub fn wait_until_done(&self) -> Result<(), GraphError> {
        let mut progress = self.lock_progress();
        while !(progress.done && progress.pending == 0) {
            progress = self
                .progress_changed
                .wait(progress)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        drop(progress);
        self.first_error().map_or(Ok(()), Err)
    }

    pub fn first_error(&self) -> Option<GraphError> {
        lock(&self.first_error).clone()
    }

    pub fn is_done(&self) -> bool {
        self.lock_progress().done
    }

    pub fn is_idle(&self) -> bool {
        self.lock_progress().pending == 0
    }
}
