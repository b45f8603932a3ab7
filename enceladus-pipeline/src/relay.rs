//! Bounded relay queue between the Handling and Decoding stages
//!
//! A fixed-capacity FIFO shared by many producers and many consumers.
//! `push` waits while the queue is full and `pop` waits while it is empty,
//! so a slow Decoding Stage throttles the Handling Stage instead of
//! losing frames.

use enceladus_core::MAX_QUEUE_CAPACITY;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Create a relay queue holding at most `capacity` items.
///
/// `capacity` is clamped to `1..=MAX_QUEUE_CAPACITY`. The queue closes once every
/// producer is dropped; consumers still receive what was queued before.
pub fn relay_queue<T: Send>(capacity: usize) -> (RelayProducer<T>, RelayConsumer<T>) {
    let capacity = capacity.clamp(1, MAX_QUEUE_CAPACITY);
    let (tx, rx) = mpsc::channel(capacity);
    (
        RelayProducer { tx, capacity },
        RelayConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Returned by [`RelayProducer::push`] when every consumer is gone
#[derive(Debug, PartialEq, Eq)]
pub struct RelayClosed<T>(pub T);

/// Enqueueing half, cloned once per Handling Stage worker
#[derive(Debug)]
pub struct RelayProducer<T> {
    tx: mpsc::Sender<T>,
    capacity: usize,
}

impl<T> Clone for RelayProducer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T: Send> RelayProducer<T> {
    /// Enqueue `item`, waiting for a free slot.
    ///
    /// Items from one producer are dequeued in the order they were pushed.
    pub async fn push(&self, item: T) -> Result<(), RelayClosed<T>> {
        self.tx.send(item).await.map_err(|e| RelayClosed(e.0))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dequeueing half, cloned once per Decoding Stage worker
#[derive(Debug)]
pub struct RelayConsumer<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for RelayConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T: Send> RelayConsumer<T> {
    /// Dequeue the oldest item, waiting while the queue is empty.
    ///
    /// `None` once the queue is closed and drained. Cancel safe.
    pub async fn pop(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Dequeue the oldest item if one is queued right now
    pub async fn try_pop(&self) -> Option<T> {
        self.rx.lock().await.try_recv().ok()
    }
}
