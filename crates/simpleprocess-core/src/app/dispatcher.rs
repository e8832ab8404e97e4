//! Dispatcher - 1 job 分の処理
//!
//! lookup (registry) → SyncRunner → apply (metadata). Used by the worker loop
//! for the in-memory bus and directly as the handler of a wire subscription.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::apply::apply_result;
use super::runner::{Runner, SyncRunner};
use crate::domain::{Job, JobContext, JobResult, WorkerError};
use crate::ports::{JobHandler, Metadata};
use crate::uow::{UnitOfWork, UowRegistry};

/// Dispatcher は 1 job を lookup → execute → apply する
///
/// `WorkerLoop` は各段階を個別に呼んで状態を公開し、wire subscription は
/// [`JobHandler`] として `dispatch` をまとめて呼ぶ。
///
/// # Example
/// ```ignore
/// let dispatcher = Dispatcher::new(Arc::new(registry), metadata)
///     .with_job_timeout(Some(Duration::from_secs(30)));
/// dispatcher.dispatch(&ctx, &job).await?;
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<UowRegistry>,
    metadata: Arc<dyn Metadata>,
    job_timeout: Option<Duration>,
}

impl Dispatcher {
    /// タイムアウトなしの Dispatcher を作成
    pub fn new(registry: Arc<UowRegistry>, metadata: Arc<dyn Metadata>) -> Self {
        Self {
            registry,
            metadata,
            job_timeout: None,
        }
    }

    /// Bound each job (execute + apply) by `timeout`.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// 共有している registry
    pub fn registry(&self) -> &UowRegistry {
        &self.registry
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout
    }

    /// `job.uow` に対応する UoW を引く
    ///
    /// 未登録 (空文字を含む) なら `WorkerError::NoSuchUow`。
    pub fn lookup(&self, job: &Job) -> Result<Arc<dyn UnitOfWork>, WorkerError> {
        self.registry
            .get(&job.uow)
            .ok_or_else(|| WorkerError::NoSuchUow(job.uow.clone()))
    }

    /// Run the job's UoW in-process.
    pub async fn execute(
        &self,
        ctx: &JobContext,
        uow: &dyn UnitOfWork,
        job: &Job,
    ) -> Result<JobResult, WorkerError> {
        SyncRunner
            .run(ctx, uow, job)
            .await?
            .ok_or(WorkerError::EmptyResult)
    }

    /// 結果を metadata に反映 (attributes → artifacts)
    pub async fn apply(&self, ctx: &JobContext, result: &JobResult) -> Result<(), WorkerError> {
        apply_result(self.metadata.as_ref(), ctx, result).await?;
        Ok(())
    }

    /// Child context for one job, carrying the per-job timeout if set.
    pub fn job_context(&self, ctx: &JobContext) -> JobContext {
        match self.job_timeout {
            Some(t) => ctx.with_timeout(t),
            None => ctx.child(),
        }
    }

    /// lookup → execute → apply を 1 回で行う
    ///
    /// UoW が見つからなければ何も実行せず、metadata にも触れない。
    pub async fn dispatch(&self, ctx: &JobContext, job: &Job) -> Result<(), WorkerError> {
        let uow = self.lookup(job)?;
        let ctx = self.job_context(ctx);
        let result = self.execute(&ctx, uow.as_ref(), job).await?;
        self.apply(&ctx, &result).await?;
        debug!(job_id = %job.job_id, uow = %job.uow, file_id = %job.file.id, "job dispatched");
        Ok(())
    }
}

#[async_trait]
impl JobHandler for Dispatcher {
    async fn handle(&self, ctx: &JobContext, job: &Job) -> Result<(), WorkerError> {
        self.dispatch(ctx, job).await
    }
}
