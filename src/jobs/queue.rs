//! Bounded multi-producer/multi-consumer job channel.
//!
//! The buffer bound is the system's backpressure mechanism: when imports
//! or thumbnail storms outrun the dispatcher, enqueuers wait (or get a
//! typed Full error from the non-blocking path) instead of growing
//! memory without limit.

use tokio::sync::mpsc;
use tokio::sync::Mutex;

use super::Job;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    /// Normal backpressure, not a fault; callers retry or surface a
    /// 503-equivalent.
    #[error("job queue is at capacity")]
    Full,
    #[error("job queue is closed")]
    Closed,
}

/// Fixed-capacity job buffer safe for any number of producers and
/// consumers. The single receiver sits behind an async mutex so several
/// worker tasks can pull from one queue; each job is delivered to
/// exactly one of them.
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Submit a job, waiting for a slot while the buffer is full.
    /// Callers abandon the wait by dropping the future.
    pub async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.tx.send(job).await.map_err(|_| QueueError::Closed)
    }

    /// Submit without waiting; `Full` is the backpressure signal.
    pub fn try_enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Next job, waiting while the buffer is empty. None once the queue
    /// has been closed and drained.
    pub async fn dequeue(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }
}
