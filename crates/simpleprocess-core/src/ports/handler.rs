//! Handler port - wire subscription から受けた job の処理
//!
//! `impls::subscribe_worker` decodes each message and calls a handler; the
//! app layer's `Dispatcher` is the usual implementation.

use async_trait::async_trait;

use crate::domain::{Job, JobContext, WorkerError};

/// Receives decoded jobs from a wire subscription.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Process one job. An error is counted and logged by the subscription,
    /// which then moves on to the next message.
    async fn handle(&self, ctx: &JobContext, job: &Job) -> Result<(), WorkerError>;
}
