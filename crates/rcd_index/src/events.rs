//! Index lifecycle events.
//!
//! Schedulers publish [`IndexEvent::RebuildRequested`] to ask for a rebuild;
//! the rebuild coordinator publishes [`IndexEvent::Rebuilt`] after every
//! unit it rebuilt successfully. Health checks subscribe to follow them.
//!
//! # Usage
//!
//! ```rust,ignore
//! let bus = EventBus::new();
//! let events = bus.subscribe();
//!
//! coordinator.rebuild_all(&RebuildRequest::all(), &CancellationToken::new());
//!
//! while let Ok(event) = events.try_recv() {
//!     println!("{event:?}");
//! }
//! ```

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// A lifecycle event of the index layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IndexEvent {
    /// A rebuild was requested.
    #[serde(rename_all = "camelCase")]
    RebuildRequested {
        /// Entity types to rebuild, `None` for all.
        targets: Option<Vec<String>>,
        /// Whether intact indexes are rebuilt too.
        force: bool,
    },
    /// One index was rebuilt.
    #[serde(rename_all = "camelCase")]
    Rebuilt {
        /// The rebuilt entity type.
        entity_type: String,
        /// Documents in the new generation.
        document_count: usize,
    },
}

/// An event with its publication sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedEvent {
    /// Sequence number, starting at 1.
    pub sequence: u64,
    /// The event.
    pub event: IndexEvent,
}

/// Distributes index events to subscribers.
///
/// Events are delivered in publication order. Subscribers whose receiver
/// was dropped are removed on the next publication. A bounded history of
/// recent events can be polled by late subscribers.
pub struct EventBus {
    subscribers: RwLock<Vec<Sender<SequencedEvent>>>,
    history: RwLock<Vec<SequencedEvent>>,
    max_history: usize,
    sequence: AtomicU64,
}

impl EventBus {
    /// Creates an event bus keeping the last 1000 events.
    pub fn new() -> Self {
        Self::with_max_history(1000)
    }

    /// Creates an event bus with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
            sequence: AtomicU64::new(0),
        }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<SequencedEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Publishes an event and returns its sequence number.
    pub fn publish(&self, event: IndexEvent) -> u64 {
        let mut history = self.history.write();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let sequenced = SequencedEvent { sequence, event };

        history.push(sequenced.clone());
        if history.len() > self.max_history {
            let excess = history.len() - self.max_history;
            history.drain(0..excess);
        }

        // Holding the history lock keeps delivery in sequence order.
        self.subscribers
            .write()
            .retain(|tx| tx.send(sequenced.clone()).is_ok());
        sequence
    }

    /// Returns up to `limit` events published after `cursor`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<SequencedEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the sequence number of the last published event.
    pub fn latest_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("latest_sequence", &self.latest_sequence())
            .finish_non_exhaustive()
    }
}
