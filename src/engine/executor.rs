// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::JoinHandle;

use crate::observability::messages::engine::{ExecutorStarted, ExecutorStopped};
use crate::observability::messages::StructuredLog;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// A named pool of worker threads pulling jobs from one FIFO channel.
///
/// Jobs are started in the order they were submitted. The pool lives as long
/// as the graph; dropping it waits for queued jobs to finish.
pub(crate) struct ThreadPoolExecutor {
    name: String,
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolExecutor {
    pub fn new(name: &str, num_threads: usize) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let num_threads = num_threads.max(1);

        let workers = (0..num_threads)
            .map(|index| {
                let receiver: Receiver<Job> = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("{}-{}", name, index))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        ExecutorStarted {
            executor: name,
            num_threads,
        }
        .log();

        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            workers,
        })
    }

    /// A handle for submitting jobs. Workers exit once every handle is gone.
    pub fn handle(&self) -> Option<Sender<Job>> {
        self.sender.clone()
    }

    /// Stops accepting jobs and joins the workers.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            // a panicking node already reported itself on its own thread
            let _ = worker.join();
        }
        ExecutorStopped {
            executor: &self.name,
        }
        .log();
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
