//! Hand-off queue between the socket task and the application tick.
//!
//! The receive loop pushes decoded frames with [`DispatchSender::enqueue`],
//! which never waits on the consumer. The application drains everything that
//! has arrived with [`DispatchReceiver::drain_all`] once per tick. Items come
//! out in exactly the order they went in.
//!
//! The queue is backed by an unbounded `tokio` MPSC channel, so the only
//! synchronisation between the two sides is the channel's internal lock-free
//! list.

use log::trace;
use thiserror::Error;
use tokio::sync::mpsc;

/// The consumer has been dropped; the item was discarded.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("dispatch queue consumer has been dropped")]
pub struct QueueClosed;

/// Create a connected sender/receiver pair.
///
/// # Examples
///
/// ```
/// use tickwire::queue::dispatch_queue;
///
/// let (tx, mut rx) = dispatch_queue();
/// tx.enqueue(1).expect("consumer alive");
/// tx.enqueue(2).expect("consumer alive");
/// assert_eq!(rx.drain_all(), vec![1, 2]);
/// assert!(rx.drain_all().is_empty());
/// ```
#[must_use]
pub fn dispatch_queue<T>() -> (DispatchSender<T>, DispatchReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DispatchSender { tx }, DispatchReceiver { rx })
}

/// Producer half, owned by the I/O path.
#[derive(Debug)]
pub struct DispatchSender<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for DispatchSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> DispatchSender<T> {
    /// Append `item` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the receiver has been dropped.
    pub fn enqueue(&self, item: T) -> Result<(), QueueClosed> {
        self.tx.send(item).map_err(|_| QueueClosed)
    }

    /// Whether the consumer has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

/// Consumer half, owned by the application tick.
#[derive(Debug)]
pub struct DispatchReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> DispatchReceiver<T> {
    /// Take every item queued before this call, oldest first.
    ///
    /// Items enqueued while draining are left for the next call, so a busy
    /// producer cannot keep a tick from finishing.
    pub fn drain_all(&mut self) -> Vec<T> {
        let pending = self.rx.len();
        let mut items = Vec::with_capacity(pending);
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(_) => break,
            }
        }
        if !items.is_empty() {
            trace!("drained {} queued items", items.len());
        }
        items
    }

    /// Take the oldest queued item, if any.
    pub fn try_dequeue(&mut self) -> Option<T> { self.rx.try_recv().ok() }

    /// Wait for the next item. Returns `None` once every sender is gone and
    /// the queue is empty.
    pub async fn recv(&mut self) -> Option<T> { self.rx.recv().await }

    /// Number of items waiting.
    #[must_use]
    pub fn len(&self) -> usize { self.rx.len() }

    /// Whether no items are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.rx.is_empty() }
}
