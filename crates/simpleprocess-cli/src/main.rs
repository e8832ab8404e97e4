use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use simpleprocess_core::Error;
use simpleprocess_core::app::{
    AsyncRunner, Dispatcher, Runner, SyncRunner, WorkerBuilder, WorkerGroup, WorkerLoop,
    apply_result,
};
use simpleprocess_core::config::WorkerConfig;
use simpleprocess_core::domain::{
    Attributes, CodecError, FileRef, Job, JobContext, JobResult, StorageError, UowError,
};
use simpleprocess_core::impls::{
    MemoryBus, MemoryMetadata, MemoryStorage, MemoryTransport, WireBus, subscribe_worker,
};
use simpleprocess_core::ports::{IdGenerator, Storage, SystemClock, UlidGenerator};
use simpleprocess_core::uow::hash::HASH_UOW;
use simpleprocess_core::uow::{HashUow, UnitOfWork};

const WORDCOUNT_UOW: &str = "wordcount";

/// Counts whitespace-separated words in a text blob.
struct WordCountUow {
    storage: Arc<dyn Storage>,
}

#[async_trait]
impl UnitOfWork for WordCountUow {
    async fn process(&self, ctx: &JobContext, job: &Job) -> Result<JobResult, UowError> {
        let mut reader = self.storage.get(ctx, job.location()).await?;
        let mut text = String::new();
        ctx.run_until(reader.read_to_string(&mut text))
            .await?
            .map_err(StorageError::Io)?;
        let words = text.split_whitespace().count();
        Ok(JobResult::for_job(job).with_attribute("words", words))
    }
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    mode: &'a str,
    file_id: &'a str,
    attributes: Option<Attributes>,
    artifacts: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "async".to_string());
    let config = WorkerConfig::from_env()?;
    info!(mode = %mode, ?config, "starting");

    // (A) 共有の collaborator を用意
    let storage = Arc::new(MemoryStorage::new());
    storage
        .insert("inbox/greeting.txt", b"hello async world".to_vec())
        .await;
    storage
        .insert("inbox/notes.txt", b"the quick brown fox jumps".to_vec())
        .await;
    let metadata = Arc::new(MemoryMetadata::new());

    // (B) UoW を登録（不足があれば起動時に失敗）
    let dispatcher = WorkerBuilder::new()
        .register(
            HASH_UOW,
            Arc::new(HashUow::new(storage.clone()).with_checksum_artifact()),
        )?
        .register(
            WORDCOUNT_UOW,
            Arc::new(WordCountUow {
                storage: storage.clone(),
            }),
        )?
        .expect_uows(&[HASH_UOW, WORDCOUNT_UOW])
        .job_timeout(config.job_timeout)
        .build(metadata.clone())?;

    // (C) job を作る（どのモードでも同じ）
    let ids = UlidGenerator::new(SystemClock);
    let jobs = vec![
        Job::new(
            ids.generate_job_id(),
            HASH_UOW,
            FileRef::new("file-greeting", "inbox/greeting.txt"),
        ),
        Job::new(
            ids.generate_job_id(),
            WORDCOUNT_UOW,
            FileRef::new("file-notes", "inbox/notes.txt"),
        ),
        // 未登録の UoW: worker は落ちずに次へ進む
        Job::new(
            ids.generate_job_id(),
            "thumbnail",
            FileRef::new("file-greeting", "inbox/greeting.txt"),
        ),
    ];

    let ctx = JobContext::background();
    match mode.as_str() {
        "inline" => run_inline(&ctx, &dispatcher, metadata.as_ref(), &jobs).await?,
        "async" => run_async(&ctx, &config, dispatcher, &jobs).await?,
        "wire" => run_wire(&ctx, &config, dispatcher, &metadata, &jobs).await?,
        other => {
            warn!(mode = %other, "unknown mode; expected inline, async or wire");
            return Ok(());
        }
    }

    // (D) 結果を確認
    wait_for(&metadata, &["file-greeting", "file-notes"]).await;
    for file_id in ["file-greeting", "file-notes"] {
        let summary = Summary {
            mode: &mode,
            file_id,
            attributes: metadata.attributes(file_id).await,
            artifacts: metadata.artifacts(file_id).await.len(),
        };
        let json = serde_json::to_string_pretty(&summary).map_err(CodecError::Serialize)?;
        println!("{json}");
    }
    Ok(())
}

/// SyncRunner で直接実行し、その場で metadata に反映する。
async fn run_inline(
    ctx: &JobContext,
    dispatcher: &Dispatcher,
    metadata: &MemoryMetadata,
    jobs: &[Job],
) -> Result<(), Error> {
    for job in jobs {
        let Some(uow) = dispatcher.registry().get(&job.uow) else {
            warn!(job_id = %job.job_id, uow = %job.uow, "skipping job: no such uow");
            continue;
        };
        if let Some(result) = SyncRunner.run(ctx, uow.as_ref(), job).await? {
            apply_result(metadata, ctx, &result).await?;
        }
    }
    Ok(())
}

/// MemoryBus + WorkerGroup。publish は job を渡した時点で返る。
async fn run_async(
    ctx: &JobContext,
    config: &WorkerConfig,
    dispatcher: Dispatcher,
    jobs: &[Job],
) -> Result<(), Error> {
    let bus = MemoryBus::new(config.queue_capacity);
    let template = WorkerLoop::new(dispatcher, Arc::new(bus.subscribe()))
        .with_failure_policy(config.failure_policy);
    let group = WorkerGroup::spawn(config.concurrency, &template, ctx);

    let runner = AsyncRunner::new(Arc::new(bus.clone()));
    for job in jobs {
        runner.run(ctx, &NoopUow, job).await?;
    }

    bus.close().await?;
    let exits = group.join().await;
    info!(workers = exits.len(), counts = ?template.counts(), "workers finished");
    Ok(())
}

/// WireBus over MemoryTransport: envelope を経由する queue group 配送。
async fn run_wire(
    ctx: &JobContext,
    config: &WorkerConfig,
    dispatcher: Dispatcher,
    metadata: &MemoryMetadata,
    jobs: &[Job],
) -> Result<(), Error> {
    let transport = Arc::new(MemoryTransport::new());
    let handler = Arc::new(dispatcher);
    let mut subs = Vec::with_capacity(config.concurrency);
    for _ in 0..config.concurrency.max(1) {
        subs.push(
            subscribe_worker(
                transport.clone(),
                &config.subject,
                &config.queue_group,
                handler.clone(),
                ctx,
            )
            .await?,
        );
    }

    let bus = WireBus::new(transport.clone(), config.subject.clone(), config.source.clone())?;
    let runner = AsyncRunner::new(Arc::new(bus));
    let publish_ctx = ctx.with_timeout(Duration::from_secs(5));
    for job in jobs {
        runner.run(&publish_ctx, &NoopUow, job).await?;
    }

    wait_for(metadata, &["file-greeting", "file-notes"]).await;
    for sub in subs {
        info!(counts = ?sub.counts(), "wire worker");
        sub.stop();
        sub.join().await;
    }
    Ok(())
}

/// Passed to `AsyncRunner`, which never calls it; the worker resolves the
/// real UoW by name.
struct NoopUow;

#[async_trait]
impl UnitOfWork for NoopUow {
    async fn process(&self, _ctx: &JobContext, job: &Job) -> Result<JobResult, UowError> {
        Ok(JobResult::for_job(job))
    }
}

/// Poll until every file has attributes, or give up after two seconds.
async fn wait_for(metadata: &MemoryMetadata, file_ids: &[&str]) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        let mut ready = true;
        for id in file_ids {
            ready &= metadata.attributes(id).await.is_some();
        }
        if ready {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    warn!(?file_ids, "timed out waiting for results");
}
