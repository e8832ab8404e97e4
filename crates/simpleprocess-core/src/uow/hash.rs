//! HashUow - SHA-256 of a blob.
//!
//! Reads `job.file.blob.location` from storage and reports
//! `{"sha256": <lowercase hex>}`. With [`HashUow::with_checksum_artifact`] it
//! also writes the digest to `artifacts/<file_id>.sha256` and reports it as a
//! `checksum` artifact.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::UnitOfWork;
use crate::domain::{Artifact, Job, JobContext, JobResult, StorageError, UowError};
use crate::ports::Storage;

/// Registry name conventionally used for this UoW.
pub const HASH_UOW: &str = "hash";
pub const SHA256_ATTRIBUTE: &str = "sha256";
pub const CHECKSUM_KIND: &str = "checksum";

const READ_CHUNK: usize = 64 * 1024;

/// blob の SHA-256 を計算する UoW
pub struct HashUow {
    storage: Arc<dyn Storage>,
    emit_artifact: bool,
}

impl HashUow {
    /// artifact を書かない HashUow を作成
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            emit_artifact: false,
        }
    }

    /// Also persist the digest and report it as an artifact.
    pub fn with_checksum_artifact(mut self) -> Self {
        self.emit_artifact = true;
        self
    }

    /// checksum artifact の保存先 (`artifacts/<file_id>.sha256`)
    pub fn artifact_location(file_id: &str) -> String {
        format!("artifacts/{file_id}.sha256")
    }
}

#[async_trait]
impl UnitOfWork for HashUow {
    async fn process(&self, ctx: &JobContext, job: &Job) -> Result<JobResult, UowError> {
        let mut reader = self.storage.get(ctx, job.location()).await?;
        let digest = ctx
            .run_until(sha256_hex(&mut reader))
            .await?
            .map_err(StorageError::Io)?;
        drop(reader);

        debug!(job_id = %job.job_id, file_id = %job.file.id, sha256 = %digest, "hashed blob");

        let mut result = JobResult::for_job(job).with_attribute(SHA256_ATTRIBUTE, digest.clone());

        if self.emit_artifact {
            let location = Self::artifact_location(&job.file.id);
            self.storage
                .put(ctx, &location, &mut digest.as_bytes())
                .await?;
            result = result.with_artifact(Artifact {
                kind: CHECKSUM_KIND.to_string(),
                mime: "text/plain".to_string(),
                bytes: digest.len() as u64,
                location,
            });
        }

        Ok(result)
    }
}

async fn sha256_hex<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
