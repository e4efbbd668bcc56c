//! Fan-out of indexer events to feed subscribers.
//!
//! Producers send commands to a single hub task over an unbounded channel.
//! The hub owns the subscriber table, so subscribing while a publish is in
//! progress needs no locking: commands are applied strictly in order.
//! Each subscriber gets a bounded channel; a subscriber whose channel is
//! full or closed is dropped from the table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::types::{IndexerEvent, WatcherStats};

enum Command {
    Subscribe {
        id: u64,
        sender: mpsc::Sender<IndexerEvent>,
    },
    Unsubscribe(u64),
    Publish(IndexerEvent),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the broadcast hub. The hub stops once every handle
/// and subscription is dropped.
#[derive(Clone, Debug)]
pub struct EventBroadcaster {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    buffer: usize,
}

impl EventBroadcaster {
    /// Spawns the hub task. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_hub(rx));
        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            buffer: buffer.max(1),
        }
    }

    /// Registers a subscriber. Its first event is the latest stats snapshot
    /// (idle stats when nothing has been published yet).
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);
        if self.commands.send(Command::Subscribe { id, sender }).is_err() {
            tracing::debug!(subscriber = id, "Broadcast hub is gone; subscription is inert");
        }
        Subscription {
            id,
            receiver,
            commands: self.commands.clone(),
        }
    }

    /// Removes a subscriber. Dropping the `Subscription` does the same.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Delivers `event` to every current subscriber.
    pub fn publish(&self, event: IndexerEvent) {
        if self.commands.send(Command::Publish(event)).is_err() {
            tracing::debug!("Broadcast hub is gone; event dropped");
        }
    }

    pub fn publish_stats(&self, stats: WatcherStats) {
        self.publish(IndexerEvent::Stats { stats });
    }

    /// Number of live subscribers, after all previously sent commands applied.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Count(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Receiving end of one feed subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<IndexerEvent>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<IndexerEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unsubscribe(self.id));
    }
}

async fn run_hub(mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut subscribers: HashMap<u64, mpsc::Sender<IndexerEvent>> = HashMap::new();
    let mut last_stats: Option<WatcherStats> = None;

    while let Some(command) = commands.recv().await {
        match command {
            Command::Subscribe { id, sender } => {
                let stats = last_stats.clone().unwrap_or_else(WatcherStats::idle);
                if sender.try_send(IndexerEvent::Stats { stats }).is_ok() {
                    subscribers.insert(id, sender);
                    tracing::debug!(subscriber = id, total = subscribers.len(), "Subscriber added");
                }
            }
            Command::Unsubscribe(id) => {
                if subscribers.remove(&id).is_some() {
                    tracing::debug!(subscriber = id, total = subscribers.len(), "Subscriber removed");
                }
            }
            Command::Publish(event) => {
                if let IndexerEvent::Stats { stats } = &event {
                    last_stats = Some(stats.clone());
                }
                subscribers.retain(|id, sender| match sender.try_send(event.clone()) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!(subscriber = *id, error = %e, "Dropping subscriber");
                        false
                    }
                });
            }
            Command::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }
}
