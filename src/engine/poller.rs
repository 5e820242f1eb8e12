// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use tokio::sync::mpsc::UnboundedReceiver;

use crate::packet::Packet;

/// Pull-style observer of one stream.
///
/// Receives every packet sent on the stream after the run starts. The poller
/// ends (`None`) once the stream is `Done` and every packet has been read.
#[derive(Debug)]
pub struct OutputStreamPoller {
    stream: String,
    receiver: UnboundedReceiver<Packet>,
}

impl OutputStreamPoller {
    pub(crate) fn new(stream: &str, receiver: UnboundedReceiver<Packet>) -> Self {
        Self {
            stream: stream.to_string(),
            receiver,
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream
    }

    /// Blocks until the next packet. Must not be called from async code;
    /// use [`OutputStreamPoller::next_async`] there.
    pub fn next(&mut self) -> Option<Packet> {
        self.receiver.blocking_recv()
    }

    pub async fn next_async(&mut self) -> Option<Packet> {
        self.receiver.recv().await
    }

    /// A packet if one is already waiting.
    pub fn try_next(&mut self) -> Option<Packet> {
        self.receiver.try_recv().ok()
    }

    /// Reads until the stream is done.
    pub fn collect_all(&mut self) -> Vec<Packet> {
        std::iter::from_fn(|| self.next()).collect()
    }
}
