//! Bus port - job の配送（publish 側）
//!
//! Consumers are implementation specific: the in-memory bus hands out a
//! subscription, wire buses deliver through `subscribe_worker`.

use async_trait::async_trait;

use crate::domain::{BusError, Job, JobContext};

/// Bus は job の publish 側
#[async_trait]
pub trait Bus: Send + Sync {
    /// Hand `job` to the bus. Returns once the bus has accepted it; says
    /// nothing about whether or when it is processed.
    async fn publish(&self, ctx: &JobContext, job: &Job) -> Result<(), BusError>;
}

/// Receive side of a bus, as seen by a worker loop.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Next job, or `None` once the source is closed and drained.
    async fn next_job(&self) -> Option<Job>;
}
