//! Storage port - blob storage（in-memory / object store）
//!
//! Reads hand back an owned reader; dropping it releases the handle, which
//! covers every exit path of the caller (success, error, cancellation).

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::domain::{JobContext, StorageError};

/// Readable blob content.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Storage は location で blob を読み書きする
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open the blob at `location`. Missing blobs are `StorageError::NotFound`.
    async fn get(&self, ctx: &JobContext, location: &str) -> Result<BlobReader, StorageError>;

    /// Store everything `reader` yields at `location`, replacing any previous blob.
    async fn put(
        &self,
        ctx: &JobContext,
        location: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StorageError>;

    /// A URL a third party can fetch the blob from.
    async fn presign_get(&self, ctx: &JobContext, location: &str) -> Result<String, StorageError>;
}
