//! MemoryBus - 開発用の bounded job bus
//!
//! # 実装詳細
//! - `Mutex<BusState>` guards the FIFO queue and the closed flag.
//! - `not_empty` / `not_full` (Notify) wake consumers / blocked publishers.
//! - Waiters enable their `Notified` while still holding the lock, so a wake-up
//!   between unlock and await is never lost.
//!
//! # close
//! - Second `close()` → `BusError::AlreadyClosed`.
//! - `publish` after close, or blocked on a full queue when close happens →
//!   `BusError::Closed`.
//! - Subscribers drain jobs that were already queued, then see `None`.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::domain::{BusError, Job, JobContext};
use crate::ports::{Bus, JobSource};

struct BusState {
    queue: VecDeque<Job>,
    closed: bool,
}

struct BusInner {
    state: Mutex<BusState>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

/// MemoryBus は容量付きのプロセス内 bus
///
/// # Example
/// ```ignore
/// let bus = MemoryBus::new(16);
/// let sub = bus.subscribe();
/// bus.publish(&ctx, &job).await?;
/// assert_eq!(sub.next_job().await, Some(job));
/// bus.close().await?;
/// ```
///
/// # 学習ポイント
/// - `Notify` の `enable()` をロック中に呼び、起床の取りこぼしを防ぐ
/// - clone は同じキューを共有するハンドル
#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    /// Bus holding at most `capacity` undelivered jobs (0 is raised to 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState {
                    queue: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                capacity,
                not_empty: Notify::new(),
                not_full: Notify::new(),
            }),
        }
    }

    /// Receive handle. All subscriptions share one queue, so each job goes to
    /// exactly one of them.
    pub fn subscribe(&self) -> MemorySubscription {
        MemorySubscription {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Stop accepting jobs. One-time: a second call is an error.
    pub async fn close(&self) -> Result<(), BusError> {
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(BusError::AlreadyClosed);
            }
            state.closed = true;
        }
        self.inner.not_empty.notify_waiters();
        self.inner.not_full.notify_waiters();
        debug!("memory bus closed");
        Ok(())
    }

    /// close 済みかどうか
    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed
    }

    /// Jobs currently queued.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// キューの最大長
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

#[async_trait]
impl Bus for MemoryBus {
    /// Enqueue, waiting for room. A done context returns its error and leaves
    /// the queue untouched.
    async fn publish(&self, ctx: &JobContext, job: &Job) -> Result<(), BusError> {
        loop {
            let notified = self.inner.not_full.notified();
            tokio::pin!(notified);
            {
                let mut state = self.inner.state.lock().await;
                if state.closed {
                    return Err(BusError::Closed);
                }
                if let Some(err) = ctx.err() {
                    return Err(err.into());
                }
                if state.queue.len() < self.inner.capacity {
                    state.queue.push_back(job.clone());
                    drop(state);
                    self.inner.not_empty.notify_one();
                    return Ok(());
                }
                notified.as_mut().enable();
            }

            tokio::select! {
                _ = &mut notified => {}
                err = ctx.done() => return Err(err.into()),
            }
        }
    }
}

/// Consumer side of a [`MemoryBus`].
#[derive(Clone)]
pub struct MemorySubscription {
    inner: Arc<BusInner>,
}

impl MemorySubscription {
    /// Next job in publish order; `None` once the bus is closed and drained.
    pub async fn recv(&self) -> Option<Job> {
        loop {
            let notified = self.inner.not_empty.notified();
            tokio::pin!(notified);
            {
                let mut state = self.inner.state.lock().await;
                if let Some(job) = state.queue.pop_front() {
                    drop(state);
                    self.inner.not_full.notify_one();
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
                notified.as_mut().enable();
            }
            notified.await;
        }
    }
}

#[async_trait]
impl JobSource for MemorySubscription {
    async fn next_job(&self) -> Option<Job> {
        self.recv().await
    }
}
