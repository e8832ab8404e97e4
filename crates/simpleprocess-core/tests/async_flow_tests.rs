//! End-to-end tests for the asynchronous execution path.
//!
//! These tests validate that:
//! - A job published through the AsyncRunner is executed by a worker loop and
//!   its result lands in the metadata store.
//! - A job naming an unregistered UoW mutates nothing and does not wedge the
//!   worker; the next valid job still completes.
//! - The same holds over the wire path (envelope + queue group transport).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use simpleprocess_core::app::{
    AsyncRunner, Dispatcher, FailurePolicy, Runner, SyncRunner, WorkerBuilder, WorkerExit,
    WorkerGroup, WorkerLoop, apply_result,
};
use simpleprocess_core::domain::{
    ErrorKind, FileRef, Job, JobContext, JobEnvelope, JobResult, UowError,
};
use simpleprocess_core::impls::{
    MemoryBus, MemoryMetadata, MemoryStorage, MemoryTransport, WireBus, subscribe_worker,
};
use simpleprocess_core::ports::{IdGenerator, SystemClock, Transport, UlidGenerator};
use simpleprocess_core::uow::{HashUow, UnitOfWork};

const HELLO_ASYNC_SHA256: &str =
    "23d3590d64af323ca8ddbfd54ee96263f8d7fd42fc0db36617cdccd5d1b1482e";

struct Harness {
    storage: Arc<MemoryStorage>,
    metadata: Arc<MemoryMetadata>,
    dispatcher: Dispatcher,
}

/// Storage seeded with `hello async world` at `in/hello.txt`, a hash UoW that
/// also emits its checksum artifact, and an empty metadata store.
async fn harness() -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .insert("in/hello.txt", b"hello async world".to_vec())
        .await;
    let metadata = Arc::new(MemoryMetadata::new());
    let dispatcher = WorkerBuilder::new()
        .register(
            "hash",
            Arc::new(HashUow::new(storage.clone()).with_checksum_artifact()),
        )
        .unwrap()
        .expect_uows(&["hash"])
        .build(metadata.clone())
        .unwrap();
    Harness {
        storage,
        metadata,
        dispatcher,
    }
}

fn hash_job(id: &str, file_id: &str) -> Job {
    Job::new(id, "hash", FileRef::new(file_id, "in/hello.txt"))
}

/// Poll the store until `file_id` has attributes or the bound expires.
async fn wait_for_attributes(metadata: &MemoryMetadata, file_id: &str) -> bool {
    timeout(Duration::from_secs(2), async {
        loop {
            if metadata.attributes(file_id).await.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Poll `done` until it holds or the bound expires.
async fn eventually(done: impl Fn() -> bool) -> bool {
    timeout(Duration::from_secs(2), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Never called by the AsyncRunner.
struct Unused;

#[async_trait::async_trait]
impl UnitOfWork for Unused {
    async fn process(&self, _ctx: &JobContext, job: &Job) -> Result<JobResult, UowError> {
        Ok(JobResult::for_job(job))
    }
}

// ---------------------------------------------------------------------------
// Test 1: async success over the in-memory bus
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_async_job_reaches_metadata() {
    let h = harness().await;
    let bus = MemoryBus::new(4);
    let worker = WorkerLoop::new(h.dispatcher, Arc::new(bus.subscribe()));
    let ctx = JobContext::background();
    let group = WorkerGroup::spawn(1, &worker, &ctx);

    let runner = AsyncRunner::new(Arc::new(bus.clone()));
    let out = runner
        .run(&ctx, &Unused, &hash_job("job-1", "file-1"))
        .await
        .unwrap();
    assert!(out.is_none(), "async runner never returns a result");

    assert!(wait_for_attributes(&h.metadata, "file-1").await);
    let attrs = h.metadata.attributes("file-1").await.unwrap();
    assert_eq!(attrs["sha256"], HELLO_ASYNC_SHA256);

    let artifacts = h.metadata.artifacts("file-1").await;
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].kind, "checksum");
    assert_eq!(artifacts[0].location, "artifacts/file-1.sha256");
    assert_eq!(
        h.storage.contents("artifacts/file-1.sha256").await.unwrap(),
        HELLO_ASYNC_SHA256.as_bytes()
    );

    let exits = group.shutdown_and_join().await;
    assert!(matches!(exits.as_slice(), [WorkerExit::Cancelled]));
}

// ---------------------------------------------------------------------------
// Test 2: unknown UoW is isolated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_uow_does_not_mutate_or_wedge() {
    let h = harness().await;
    let bus = MemoryBus::new(4);
    let (failures_tx, mut failures_rx) = mpsc::unbounded_channel();
    let worker = WorkerLoop::new(h.dispatcher, Arc::new(bus.subscribe()))
        .with_failure_channel(failures_tx);
    let ctx = JobContext::background();
    let group = WorkerGroup::spawn(1, &worker, &ctx);
    let runner = AsyncRunner::new(Arc::new(bus.clone()));

    let bogus = Job::new("job-bogus", "does-not-exist", FileRef::new("file-x", "in/hello.txt"));
    runner.run(&ctx, &Unused, &bogus).await.unwrap();

    let failure = timeout(Duration::from_secs(1), failures_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.job_id, "job-bogus");
    assert_eq!(failure.kind, ErrorKind::Handler);
    assert!(h.metadata.attributes("file-x").await.is_none());
    assert!(h.metadata.artifacts("file-x").await.is_empty());

    runner
        .run(&ctx, &Unused, &hash_job("job-2", "file-2"))
        .await
        .unwrap();
    assert!(wait_for_attributes(&h.metadata, "file-2").await);
    assert!(eventually(|| worker.counts().settled() == 2).await);

    let counts = worker.counts();
    assert_eq!(counts.unknown_uow, 1);
    assert_eq!(counts.succeeded, 1);

    let snapshot = h.metadata.snapshot().await;
    assert_eq!(snapshot.attributes.len(), 1);

    group.shutdown_and_join().await;
}

// ---------------------------------------------------------------------------
// Test 3: wire path (envelope codec + queue group transport)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_wire_job_reaches_metadata() {
    let h = harness().await;
    let transport = Arc::new(MemoryTransport::new());
    let ctx = JobContext::background();

    let sub = subscribe_worker(
        transport.clone(),
        "simple-process.jobs",
        "",
        Arc::new(h.dispatcher),
        &ctx,
    )
    .await
    .unwrap();

    let ids = UlidGenerator::new(SystemClock);
    let bus = WireBus::new(transport.clone(), "simple-process.jobs", "tests").unwrap();
    let runner = AsyncRunner::new(Arc::new(bus));

    // Garbage on the subject must not stop the subscription.
    transport
        .send("simple-process.jobs", b"{not json".to_vec())
        .await
        .unwrap();

    let bogus = Job::new(ids.generate_job_id(), "nope", FileRef::new("file-x", "in/hello.txt"));
    runner.run(&ctx, &Unused, &bogus).await.unwrap();

    let job = hash_job(&ids.generate_job_id(), "file-wire");
    let publish_ctx = ctx.with_timeout(Duration::from_secs(1));
    runner.run(&publish_ctx, &Unused, &job).await.unwrap();

    assert!(wait_for_attributes(&h.metadata, "file-wire").await);
    assert_eq!(
        h.metadata.attributes("file-wire").await.unwrap()["sha256"],
        HELLO_ASYNC_SHA256
    );
    assert!(h.metadata.attributes("file-x").await.is_none());
    assert!(eventually(|| sub.counts().settled() == 3).await);

    let counts = sub.counts();
    assert_eq!(counts.received, 3);
    assert_eq!(counts.succeeded, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.unknown_uow, 1);

    let flushes = transport.flush_log().await;
    assert_eq!(flushes.len(), 2);
    assert_eq!(flushes[0], None);
    assert!(flushes[1].is_some());

    sub.stop();
    timeout(Duration::from_secs(1), sub.join()).await.unwrap();
}

// ---------------------------------------------------------------------------
// Test 4: sync and async paths produce the same metadata
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sync_and_async_agree() {
    let h = harness().await;
    let ctx = JobContext::background();

    let uow = h.dispatcher.lookup(&hash_job("j", "f")).unwrap();
    let result = SyncRunner
        .run(&ctx, uow.as_ref(), &hash_job("job-sync", "file-sync"))
        .await
        .unwrap()
        .unwrap();
    apply_result(h.metadata.as_ref(), &ctx, &result).await.unwrap();

    let bus = MemoryBus::new(1);
    let worker = WorkerLoop::new(h.dispatcher.clone(), Arc::new(bus.subscribe()));
    AsyncRunner::new(Arc::new(bus.clone()))
        .run(&ctx, &Unused, &hash_job("job-async", "file-async"))
        .await
        .unwrap();
    bus.close().await.unwrap();
    let exit = timeout(Duration::from_secs(1), worker.run(&ctx)).await.unwrap();
    assert!(matches!(exit, WorkerExit::SourceClosed));

    let sync_attrs = h.metadata.attributes("file-sync").await.unwrap();
    let async_attrs = h.metadata.attributes("file-async").await.unwrap();
    assert_eq!(sync_attrs, async_attrs);
}

// ---------------------------------------------------------------------------
// Test 5: stop policy + envelope inspection on the wire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stop_policy_leaves_remaining_jobs_queued() {
    let h = harness().await;
    let bus = MemoryBus::new(4);
    let worker = WorkerLoop::new(h.dispatcher, Arc::new(bus.subscribe()))
        .with_failure_policy(FailurePolicy::Stop);
    let ctx = JobContext::background();

    // Blob missing: storage error inside the UoW.
    let broken = Job::new("job-1", "hash", FileRef::new("file-1", "in/missing.txt"));
    let runner = AsyncRunner::new(Arc::new(bus.clone()));
    runner.run(&ctx, &Unused, &broken).await.unwrap();
    runner
        .run(&ctx, &Unused, &hash_job("job-2", "file-2"))
        .await
        .unwrap();

    let exit = timeout(Duration::from_secs(1), worker.run(&ctx)).await.unwrap();
    match exit {
        WorkerExit::Failed(err) => assert_eq!(err.kind(), ErrorKind::Storage),
        other => panic!("unexpected exit: {other:?}"),
    }
    assert_eq!(bus.len().await, 1);
    assert!(h.metadata.snapshot().await.attributes.is_empty());
}

#[tokio::test]
async fn test_wire_envelope_shape() {
    let transport = Arc::new(MemoryTransport::new());
    let mut raw = transport
        .queue_subscribe("simple-process.jobs", "inspect")
        .await
        .unwrap();
    let bus = WireBus::new(transport.clone(), "simple-process.jobs", "").unwrap();

    let job = hash_job("job-42", "file-42").with_idem_key("k-1");
    AsyncRunner::new(Arc::new(bus))
        .run(&JobContext::background(), &Unused, &job)
        .await
        .unwrap();

    let bytes = raw.recv().await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["specversion"], "1.0");
    assert_eq!(value["type"], "simpleprocess.job");
    assert_eq!(value["source"], "simple-process");
    assert_eq!(value["id"], "job-42");
    assert_eq!(value["datacontenttype"], "application/json");
    assert_eq!(value["data"]["jobID"], "job-42");
    assert_eq!(value["data"]["file"]["blob"]["location"], "in/hello.txt");
    assert_eq!(value["data"]["idemKey"], "k-1");

    let decoded = JobEnvelope::from_bytes(&bytes).unwrap().decode().unwrap();
    assert_eq!(decoded, job);
}
