//! In-process FIFO queue between the dispatcher and the sink
//!
//! The channel is unbounded unless a capacity is configured: `send` never
//! blocks and never drops. With a capacity, the configured
//! [`OverflowPolicy`] decides what a full buffer does.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use watchpipe_core::config::{ChannelSettings, OverflowPolicy};

/// Capacity and overflow behaviour of a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Maximum buffered messages; `None` is unbounded
    pub capacity: Option<usize>,
    /// Applied only when `capacity` is set
    pub overflow: OverflowPolicy,
}

impl ChannelConfig {
    /// Unbounded channel (the default)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounded channel with the given overflow policy
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            overflow,
        }
    }
}

impl From<&ChannelSettings> for ChannelConfig {
    fn from(settings: &ChannelSettings) -> Self {
        match settings.capacity {
            Some(capacity) => Self::bounded(capacity, settings.overflow),
            None => Self::unbounded(),
        }
    }
}

/// Result of a [`Sender::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome<T> {
    /// The message is in the buffer
    Enqueued,
    /// The message is in the buffer; the returned oldest message was evicted
    DroppedOldest(T),
    /// The buffer was full and the message was discarded
    DroppedNewest(T),
    /// The buffer is full under [`OverflowPolicy::Block`]; retry or use `send_wait`
    Full(T),
    /// The receiver is gone
    Closed(T),
}

impl<T> SendOutcome<T> {
    /// Whether the sent message ended up in the buffer
    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued | Self::DroppedOldest(_))
    }
}

struct Shared<T> {
    buffer: Mutex<VecDeque<T>>,
    config: ChannelConfig,
    senders: AtomicUsize,
    receiver_alive: AtomicBool,
    message_ready: Notify,
    space_ready: Notify,
}

impl<T> Shared<T> {
    fn buffer(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a channel with the given configuration
pub fn channel<T>(config: ChannelConfig) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        buffer: Mutex::new(VecDeque::new()),
        config,
        senders: AtomicUsize::new(1),
        receiver_alive: AtomicBool::new(true),
        message_ready: Notify::new(),
        space_ready: Notify::new(),
    });

    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

/// Create an unbounded channel
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    channel(ChannelConfig::unbounded())
}

/// Producing half of a channel
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Enqueue a message at the tail without waiting
    pub fn send(&self, message: T) -> SendOutcome<T> {
        if !self.shared.receiver_alive.load(Ordering::Acquire) {
            return SendOutcome::Closed(message);
        }

        let outcome = {
            let mut buffer = self.shared.buffer();
            match self.shared.config.capacity {
                Some(capacity) if buffer.len() >= capacity => match self.shared.config.overflow {
                    OverflowPolicy::DropOldest => match buffer.pop_front() {
                        Some(evicted) => {
                            buffer.push_back(message);
                            SendOutcome::DroppedOldest(evicted)
                        }
                        None => {
                            buffer.push_back(message);
                            SendOutcome::Enqueued
                        }
                    },
                    OverflowPolicy::DropNewest => return SendOutcome::DroppedNewest(message),
                    OverflowPolicy::Block => return SendOutcome::Full(message),
                },
                _ => {
                    buffer.push_back(message);
                    SendOutcome::Enqueued
                }
            }
        };

        self.shared.message_ready.notify_one();
        outcome
    }

    /// Enqueue a message, waiting for space if the buffer is full under
    /// [`OverflowPolicy::Block`]
    ///
    /// Returns immediately for unbounded channels and the drop policies.
    pub async fn send_wait(&self, mut message: T) -> SendOutcome<T> {
        loop {
            // Registered before the attempt so a receive or a receiver drop
            // in between is not missed.
            let space = self.shared.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            match self.send(message) {
                SendOutcome::Full(rejected) => {
                    message = rejected;
                    space.await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.shared.buffer().len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the receiver has been dropped
    pub fn is_closed(&self) -> bool {
        !self.shared.receiver_alive.load(Ordering::Acquire)
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.message_ready.notify_one();
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("config", &self.shared.config)
            .field("len", &self.len())
            .finish()
    }
}

/// Consuming half of a channel. There is exactly one per channel.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Wait for the oldest undelivered message
    ///
    /// Returns `None` once every sender is dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(message) = self.try_recv() {
                return Some(message);
            }

            if self.shared.senders.load(Ordering::Acquire) == 0 {
                // A final send may have landed between the two checks.
                return self.try_recv();
            }

            self.shared.message_ready.notified().await;
        }
    }

    /// Take the oldest message if one is buffered
    pub fn try_recv(&mut self) -> Option<T> {
        let message = self.shared.buffer().pop_front();
        if message.is_some() && self.shared.config.capacity.is_some() {
            self.shared.space_ready.notify_one();
        }
        message
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.shared.buffer().len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adapt into a stream that ends when the channel closes
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |mut receiver| async move {
            receiver.recv().await.map(|message| (message, receiver))
        })
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.shared.receiver_alive.store(false, Ordering::Release);
        self.shared.space_ready.notify_waiters();
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("config", &self.shared.config)
            .field("len", &self.len())
            .finish()
    }
}
