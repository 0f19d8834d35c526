//! Unbounded work queues shared by worker pools.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use driveindex_core::NodeId;

/// A folder waiting to be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderTask {
    /// Node to fill in.
    pub node: NodeId,
    /// Provider id of the folder.
    pub folder_id: String,
    /// Browse URL, shown in thread reports.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Distance from the root.
    pub depth: u32,
}

/// A file whose size must be looked up separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeTask {
    /// Folder holding the file.
    pub node: NodeId,
    /// Position of the file in the folder's file list.
    pub index: usize,
    /// Provider id of the file.
    pub file_id: String,
    /// Display name.
    pub file_name: String,
}

/// A multi-consumer FIFO queue with depth and activity counters.
///
/// Items popped are accounted as active until their [`WorkGuard`] drops.
#[derive(Debug)]
pub struct WorkQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Mutex<mpsc::UnboundedReceiver<T>>,
    depth: AtomicUsize,
    active: AtomicUsize,
    enqueued: AtomicU64,
}

impl<T> WorkQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            depth: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
        }
    }

    /// Append an item.
    pub fn push(&self, item: T) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        // The receiver lives as long as `self`, so sending cannot fail.
        if self.tx.send(item).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Wait for the next item, or `None` once `stop` fires.
    pub async fn pop(&self, stop: &CancellationToken) -> Option<(T, WorkGuard<'_, T>)> {
        let mut rx = tokio::select! {
            biased;
            _ = stop.cancelled() => return None,
            rx = self.rx.lock() => rx,
        };

        let item = tokio::select! {
            biased;
            _ = stop.cancelled() => return None,
            item = rx.recv() => item?,
        };
        drop(rx);

        self.active.fetch_add(1, Ordering::SeqCst);
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some((item, WorkGuard { queue: self }))
    }

    /// Items waiting.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Check if no items are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items popped but not yet finished.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Items pushed since creation.
    pub fn total_enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks a popped item as in progress until dropped.
#[derive(Debug)]
pub struct WorkGuard<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<T> Drop for WorkGuard<'_, T> {
    fn drop(&mut self) {
        self.queue.active.fetch_sub(1, Ordering::SeqCst);
    }
}
