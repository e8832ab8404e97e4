//! Runner - UoW を「どこで」実行するかの戦略
//!
//! - [`SyncRunner`]: in-process, returns the UoW's result.
//! - [`AsyncRunner`]: publishes the job and returns `None`; the result only
//!   shows up later in the metadata store.
//!
//! Job construction is the same for both, so switching to remote execution
//! is a matter of swapping the runner.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Job, JobContext, JobResult, RunError};
use crate::ports::Bus;
use crate::uow::UnitOfWork;

/// Runner は「どこで実行するか」の戦略
///
/// # 学習ポイント
/// - 呼び出し側は Runner を差し替えるだけで in-process / bus 経由を切り替えられる
/// - 結果がその場で得られるかどうかは `Option<JobResult>` で表現
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(
        &self,
        ctx: &JobContext,
        uow: &dyn UnitOfWork,
        job: &Job,
    ) -> Result<Option<JobResult>, RunError>;
}

/// その場で UoW を実行する Runner
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncRunner;

#[async_trait]
impl Runner for SyncRunner {
    async fn run(
        &self,
        ctx: &JobContext,
        uow: &dyn UnitOfWork,
        job: &Job,
    ) -> Result<Option<JobResult>, RunError> {
        // A cancelled run yields no result at all.
        let result = ctx
            .run_until(uow.process(ctx, job))
            .await
            .map_err(|e| RunError::Uow(e.into()))??;
        Ok(Some(result))
    }
}

/// job を bus に publish するだけの Runner。結果は常に `None`
pub struct AsyncRunner {
    bus: Arc<dyn Bus>,
}

impl AsyncRunner {
    /// publish 先の bus を指定して作成
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Runner for AsyncRunner {
    /// `uow` is not used here; the worker on the other side resolves it by name.
    async fn run(
        &self,
        ctx: &JobContext,
        _uow: &dyn UnitOfWork,
        job: &Job,
    ) -> Result<Option<JobResult>, RunError> {
        self.bus.publish(ctx, job).await?;
        debug!(job_id = %job.job_id, uow = %job.uow, "job handed to bus");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BusError, ContextError, FileRef, UowError};
    use crate::impls::MemoryBus;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl UnitOfWork for Echo {
        async fn process(&self, _ctx: &JobContext, job: &Job) -> Result<JobResult, UowError> {
            Ok(JobResult::for_job(job).with_attribute("echo", job.uow.clone()))
        }
    }

    struct Broken;

    #[async_trait]
    impl UnitOfWork for Broken {
        async fn process(&self, _ctx: &JobContext, _job: &Job) -> Result<JobResult, UowError> {
            Err(UowError::Handler("boom".into()))
        }
    }

    /// Never finishes on its own.
    struct Sleepy;

    #[async_trait]
    impl UnitOfWork for Sleepy {
        async fn process(&self, _ctx: &JobContext, job: &Job) -> Result<JobResult, UowError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(JobResult::for_job(job))
        }
    }

    fn job() -> Job {
        Job::new("job-1", "echo", FileRef::new("file-1", "in.txt"))
    }

    #[tokio::test]
    async fn sync_returns_the_uow_result() {
        let out = SyncRunner
            .run(&JobContext::background(), &Echo, &job())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.attributes_patch["echo"], "echo");
        assert_eq!(out.file_id, "file-1");
    }

    #[tokio::test]
    async fn sync_passes_uow_errors_through() {
        let err = SyncRunner
            .run(&JobContext::background(), &Broken, &job())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Uow(UowError::Handler(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn sync_run_observes_deadline() {
        let ctx = JobContext::background().with_timeout(Duration::from_millis(20));
        let err = tokio::time::timeout(Duration::from_secs(1), SyncRunner.run(&ctx, &Sleepy, &job()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Uow(UowError::Cancelled(ContextError::DeadlineExceeded))
        ));
    }

    #[tokio::test]
    async fn async_publishes_and_returns_nothing() {
        let bus = MemoryBus::new(4);
        let sub = bus.subscribe();
        let runner = AsyncRunner::new(Arc::new(bus));

        let out = runner
            .run(&JobContext::background(), &Broken, &job())
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(sub.recv().await.unwrap(), job());
    }

    #[tokio::test]
    async fn async_surfaces_publish_failure() {
        let bus = MemoryBus::new(1);
        bus.close().await.unwrap();
        let runner = AsyncRunner::new(Arc::new(bus));

        let err = runner
            .run(&JobContext::background(), &Echo, &job())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Bus(BusError::Closed)));
    }
}
