//! WireBus - envelope 経由で Transport に job を流す bus
//!
//! # publish
//! 1. `JobEnvelope::encode` (source, clock)
//! 2. serialize → `Transport::send(subject, bytes)`
//! 3. `Transport::flush(timeout)`: no deadline → unbounded, deadline already
//!    passed → [`MIN_FLUSH_TIMEOUT`], otherwise the remaining time
//!
//! # subscribe_worker
//! Joins a queue group and runs a long-lived loop: bytes → envelope → job →
//! handler. A bad message or a failing (even panicking) handler is logged and
//! the loop moves on to the next message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{
    BusError, ContextError, DEFAULT_SOURCE, Job, JobContext, JobEnvelope, TransportError,
    WorkerCounts, WorkerError, WorkerStats,
};
use crate::ports::{Bus, Clock, JobHandler, SystemClock, Transport};

/// Queue group used when the caller does not name one.
pub const DEFAULT_QUEUE_GROUP: &str = "simple-process-workers";

/// Flush timeout used when the context deadline has already passed.
pub const MIN_FLUSH_TIMEOUT: Duration = Duration::from_millis(1);

/// Flush timeout for a context deadline, as seen at `now`.
pub fn flush_timeout(deadline: Option<Instant>, now: Instant) -> Option<Duration> {
    let deadline = deadline?;
    let remaining = deadline.saturating_duration_since(now);
    if remaining.is_zero() {
        Some(MIN_FLUSH_TIMEOUT)
    } else {
        Some(remaining)
    }
}

/// WireBus は job を envelope にして Transport へ publish する
///
/// # Example
/// ```ignore
/// let transport = Arc::new(MemoryTransport::new());
/// let bus = WireBus::new(transport.clone(), "jobs", "uploader")?;
/// bus.publish(&ctx.with_timeout(Duration::from_secs(5)), &job).await?;
/// ```
pub struct WireBus {
    transport: Arc<dyn Transport>,
    subject: String,
    source: String,
    clock: Arc<dyn Clock>,
}

impl WireBus {
    /// `subject` is required; an empty `source` falls back to the codec default.
    pub fn new(
        transport: Arc<dyn Transport>,
        subject: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, BusError> {
        let subject = subject.into();
        if subject.is_empty() {
            return Err(BusError::Validation("subject is required"));
        }
        let mut source = source.into();
        if source.is_empty() {
            source = DEFAULT_SOURCE.to_string();
        }
        Ok(Self {
            transport,
            subject,
            source,
            clock: Arc::new(SystemClock),
        })
    }

    /// envelope の `time` に使う時計を差し替える
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// publish 先の subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// envelope の `source`
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[async_trait]
impl Bus for WireBus {
    /// encode → send → flush。
    ///
    /// 明示的な cancel だけが publish を止める。deadline 切れは send を止めず、
    /// flush を [`MIN_FLUSH_TIMEOUT`] で待つだけになる。
    async fn publish(&self, ctx: &JobContext, job: &Job) -> Result<(), BusError> {
        if ctx.token().is_cancelled() {
            return Err(ContextError::Cancelled.into());
        }
        let envelope = JobEnvelope::encode_with_clock(&self.source, job, self.clock.as_ref())?;
        let payload = envelope.to_bytes()?;

        tokio::select! {
            biased;
            _ = ctx.token().cancelled() => return Err(ContextError::Cancelled.into()),
            res = self.transport.send(&self.subject, payload) => res?,
        }

        let timeout = flush_timeout(ctx.deadline(), Instant::now());
        let flush = async {
            match timeout {
                Some(t) => tokio::time::timeout(t, self.transport.flush(Some(t)))
                    .await
                    .unwrap_or(Err(TransportError::FlushTimeout(t))),
                None => self.transport.flush(None).await,
            }
        };
        tokio::select! {
            biased;
            _ = ctx.token().cancelled() => return Err(ContextError::Cancelled.into()),
            res = flush => res?,
        }

        debug!(job_id = %job.job_id, subject = %self.subject, "published job");
        Ok(())
    }
}

/// Handle on a running `subscribe_worker` loop.
pub struct WireSubscription {
    ctx: JobContext,
    stats: Arc<WorkerStats>,
    join: JoinHandle<()>,
}

impl WireSubscription {
    /// Ask the loop to stop after the message in flight.
    pub fn stop(&self) {
        self.ctx.cancel();
    }

    /// このサブスクリプションのカウンタ
    pub fn counts(&self) -> WorkerCounts {
        self.stats.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// loop の終了を待つ
    pub async fn join(self) {
        if let Err(err) = self.join.await {
            warn!(error = %err, "wire subscription task ended abnormally");
        }
    }
}

/// Join `group` (default [`DEFAULT_QUEUE_GROUP`]) on `subject` and feed every
/// decodable job to `handler` until `ctx` is done or the transport closes.
pub async fn subscribe_worker(
    transport: Arc<dyn Transport>,
    subject: &str,
    group: &str,
    handler: Arc<dyn JobHandler>,
    ctx: &JobContext,
) -> Result<WireSubscription, BusError> {
    if subject.is_empty() {
        return Err(BusError::Validation("subject is required"));
    }
    let group = if group.is_empty() {
        DEFAULT_QUEUE_GROUP
    } else {
        group
    };

    let mut inbox = transport.queue_subscribe(subject, group).await?;
    let loop_ctx = ctx.child();
    let stats = Arc::new(WorkerStats::default());
    let subject = subject.to_string();
    let group = group.to_string();

    info!(subject = %subject, group = %group, "wire worker subscribed");

    let join = tokio::spawn({
        let ctx = loop_ctx.clone();
        let stats = Arc::clone(&stats);
        async move {
            loop {
                let msg = tokio::select! {
                    biased;
                    _ = ctx.done() => break,
                    msg = inbox.recv() => msg,
                };
                let Some(bytes) = msg else {
                    debug!(subject = %subject, "inbox closed");
                    break;
                };
                stats.record_received();

                let job = match JobEnvelope::from_bytes(&bytes).and_then(|env| env.decode()) {
                    Ok(job) => job,
                    Err(err) => {
                        stats.record_failed();
                        warn!(subject = %subject, error = %err, "failed to decode job envelope");
                        continue;
                    }
                };

                let job_id = job.job_id.clone();
                let handler = Arc::clone(&handler);
                let job_ctx = ctx.child();
                let outcome =
                    tokio::spawn(async move { handler.handle(&job_ctx, &job).await }).await;

                match outcome {
                    Ok(Ok(())) => stats.record_succeeded(),
                    Ok(Err(err)) => {
                        if matches!(err, WorkerError::NoSuchUow(_)) {
                            stats.record_unknown_uow();
                        } else {
                            stats.record_failed();
                        }
                        warn!(subject = %subject, job_id = %job_id, error = %err, "handler error");
                    }
                    Err(err) => {
                        stats.record_failed();
                        warn!(subject = %subject, job_id = %job_id, error = %err, "handler panicked");
                    }
                }
            }
            info!(subject = %subject, group = %group, "wire worker stopped");
        }
    });

    Ok(WireSubscription {
        ctx: loop_ctx,
        stats,
        join,
    })
}
