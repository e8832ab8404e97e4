//! WorkerLoop - bus → UoW → metadata の実行ループ
//!
//! # フロー
//! 1. Idle: `JobSource::next_job()` で次の job を待つ
//! 2. Dispatching: registry から UoW を引く (無ければ `NoSuchUow`)
//! 3. Executing: SyncRunner で実行
//! 4. Applying: attributes → artifacts の順に metadata へ反映
//! 5. Idle に戻る
//!
//! The loop stops when the source is closed and drained or when its context is
//! done. A failing job is counted, logged and optionally reported on the
//! failure channel; what happens next is decided by the [`FailurePolicy`].

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dispatcher::Dispatcher;
use crate::domain::{
    ErrorKind, Job, JobContext, WorkerCounts, WorkerError, WorkerState, WorkerStats,
};
use crate::ports::JobSource;

/// What the loop does after a job fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log, report and move on to the next job.
    #[default]
    Continue,
    /// End the loop with the failure.
    Stop,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "stop" => Ok(FailurePolicy::Stop),
            other => Err(format!("expected 'continue' or 'stop', got '{other}'")),
        }
    }
}

/// Out-of-band report of a job that failed after it left its publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job_id: String,
    pub uow: String,
    pub kind: ErrorKind,
    pub error: String,
}

impl JobFailure {
    fn new(job: &Job, err: &WorkerError) -> Self {
        Self {
            job_id: job.job_id.clone(),
            uow: job.uow.clone(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// Why [`WorkerLoop::run`] returned.
#[derive(Debug)]
pub enum WorkerExit {
    /// The source was closed and every queued job was taken.
    SourceClosed,
    /// The loop's context was cancelled or its deadline passed.
    Cancelled,
    /// A job failed under [`FailurePolicy::Stop`].
    Failed(WorkerError),
}

/// WorkerLoop は JobSource から job を受けて順に処理する
///
/// # Example
/// ```ignore
/// let template = WorkerLoop::new(dispatcher, Arc::new(bus.subscribe()))
///     .with_failure_policy(FailurePolicy::Continue);
/// let exit = template.run(&ctx).await;
/// ```
///
/// # 学習ポイント
/// - 状態は `watch` チャネルで公開（最新値だけ見えればよい）
/// - カウンタは `Arc<WorkerStats>` で fork 間共有
/// - 自分の shutdown による Cancelled は job の失敗として数えない
pub struct WorkerLoop {
    dispatcher: Dispatcher,
    source: Arc<dyn JobSource>,
    policy: FailurePolicy,
    failures: Option<mpsc::UnboundedSender<JobFailure>>,
    stats: Arc<WorkerStats>,
    state: watch::Sender<WorkerState>,
}

impl WorkerLoop {
    /// `FailurePolicy::Continue` で新しい loop を作成
    pub fn new(dispatcher: Dispatcher, source: Arc<dyn JobSource>) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            dispatcher,
            source,
            policy: FailurePolicy::default(),
            failures: None,
            stats: Arc::new(WorkerStats::default()),
            state,
        }
    }

    /// job 失敗後の振る舞いを設定
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report every failed job on `tx`. A closed receiver is ignored.
    pub fn with_failure_channel(mut self, tx: mpsc::UnboundedSender<JobFailure>) -> Self {
        self.failures = Some(tx);
        self
    }

    /// Another loop over the same source, dispatcher, policy and counters,
    /// with its own state channel.
    pub fn fork(&self) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            dispatcher: self.dispatcher.clone(),
            source: Arc::clone(&self.source),
            policy: self.policy,
            failures: self.failures.clone(),
            stats: Arc::clone(&self.stats),
            state,
        }
    }

    /// 共有カウンタのスナップショット
    pub fn counts(&self) -> WorkerCounts {
        self.stats.snapshot()
    }

    /// 共有カウンタそのもの
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// 現在の状態を購読する
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// source が閉じる、ctx が done になる、または Stop ポリシーで失敗するまで回す
    ///
    /// 戻る時点で状態は必ず `Stopped`。
    pub async fn run(&self, ctx: &JobContext) -> WorkerExit {
        let exit = self.run_inner(ctx).await;
        self.state.send_replace(WorkerState::Stopped);
        debug!(?exit, "worker loop stopped");
        exit
    }

    async fn run_inner(&self, ctx: &JobContext) -> WorkerExit {
        loop {
            self.state.send_replace(WorkerState::Idle);

            let next = tokio::select! {
                biased;
                _ = ctx.done() => return WorkerExit::Cancelled,
                job = self.source.next_job() => job,
            };
            let Some(job) = next else {
                return WorkerExit::SourceClosed;
            };
            self.stats.record_received();

            let Err(err) = self.process(ctx, &job).await else {
                self.stats.record_succeeded();
                continue;
            };

            // Failures caused by our own shutdown are not job failures.
            if ctx.err().is_some() && err.kind() == ErrorKind::Cancelled {
                return WorkerExit::Cancelled;
            }

            self.report(&job, &err);
            if self.policy == FailurePolicy::Stop {
                return WorkerExit::Failed(err);
            }
        }
    }

    async fn process(&self, ctx: &JobContext, job: &Job) -> Result<(), WorkerError> {
        self.state.send_replace(WorkerState::Dispatching);
        let uow = self.dispatcher.lookup(job)?;
        let job_ctx = self.dispatcher.job_context(ctx);

        self.state.send_replace(WorkerState::Executing);
        let result = self.dispatcher.execute(&job_ctx, uow.as_ref(), job).await?;

        self.state.send_replace(WorkerState::Applying);
        self.dispatcher.apply(&job_ctx, &result).await?;

        debug!(job_id = %job.job_id, uow = %job.uow, file_id = %job.file.id, "job done");
        Ok(())
    }

    fn report(&self, job: &Job, err: &WorkerError) {
        if let WorkerError::NoSuchUow(_) = err {
            self.stats.record_unknown_uow();
            warn!(job_id = %job.job_id, uow = %job.uow, "no uow registered; job dropped");
        } else {
            self.stats.record_failed();
            error!(
                job_id = %job.job_id,
                uow = %job.uow,
                file_id = %job.file.id,
                kind = ?err.kind(),
                error = %err,
                "job failed"
            );
        }
        if let Some(tx) = &self.failures {
            let _ = tx.send(JobFailure::new(job, err));
        }
    }
}

/// N worker loops sharing one source and one set of counters.
pub struct WorkerGroup {
    ctx: JobContext,
    stats: Arc<WorkerStats>,
    states: Vec<watch::Receiver<WorkerState>>,
    joins: Vec<JoinHandle<WorkerExit>>,
}

impl WorkerGroup {
    /// Spawn `n` forks of `template` (at least one) under a child of `ctx`.
    pub fn spawn(n: usize, template: &WorkerLoop, ctx: &JobContext) -> Self {
        let n = n.max(1);
        let ctx = ctx.child();
        let mut states = Vec::with_capacity(n);
        let mut joins = Vec::with_capacity(n);

        for worker_id in 0..n {
            let worker = template.fork();
            states.push(worker.state());
            let ctx = ctx.clone();
            joins.push(tokio::spawn(async move {
                let exit = worker.run(&ctx).await;
                debug!(worker_id, ?exit, "worker exited");
                exit
            }));
        }
        info!(workers = n, "worker group started");

        Self {
            ctx,
            stats: template.stats(),
            states,
            joins,
        }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// グループ全体のカウンタ
    pub fn counts(&self) -> WorkerCounts {
        self.stats.snapshot()
    }

    /// Current state of every worker, by worker id.
    pub fn states(&self) -> Vec<WorkerState> {
        self.states.iter().map(|rx| *rx.borrow()).collect()
    }

    /// Cancel the group's context. In-flight jobs observe it too.
    pub fn request_shutdown(&self) {
        self.ctx.cancel();
    }

    /// Wait for every worker to exit on its own (e.g. the source closed).
    pub async fn join(self) -> Vec<WorkerExit> {
        let mut exits = Vec::with_capacity(self.joins.len());
        for join in self.joins {
            match join.await {
                Ok(exit) => exits.push(exit),
                Err(err) => warn!(error = %err, "worker task ended abnormally"),
            }
        }
        exits
    }

    /// `request_shutdown` してから `join`
    pub async fn shutdown_and_join(self) -> Vec<WorkerExit> {
        self.request_shutdown();
        self.join().await
    }
}
