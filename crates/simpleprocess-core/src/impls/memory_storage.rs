//! MemoryStorage - 開発・テスト用の blob ストレージ

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

use crate::domain::{JobContext, StorageError};
use crate::ports::{BlobReader, Storage};

/// Scheme of the URLs returned by `presign_get`.
pub const MEMORY_URL_SCHEME: &str = "memory://";

/// MemoryStorage は location → bytes の表
#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// 空のストレージを作成
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a blob directly.
    pub async fn insert(&self, location: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.write().await.insert(location.into(), bytes);
    }

    /// Copy of the stored bytes, if any.
    pub async fn contents(&self, location: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(location).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, ctx: &JobContext, location: &str) -> Result<BlobReader, StorageError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        let blobs = self.blobs.read().await;
        let data = blobs
            .get(location)
            .ok_or_else(|| StorageError::NotFound(location.to_string()))?;
        Ok(Box::new(Cursor::new(data.clone())))
    }

    async fn put(
        &self,
        ctx: &JobContext,
        location: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StorageError> {
        let mut data = Vec::new();
        ctx.run_until(reader.read_to_end(&mut data)).await??;
        self.blobs.write().await.insert(location.to_string(), data);
        Ok(())
    }

    async fn presign_get(&self, ctx: &JobContext, location: &str) -> Result<String, StorageError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        if !self.blobs.read().await.contains_key(location) {
            return Err(StorageError::NotFound(location.to_string()));
        }
        Ok(format!("{MEMORY_URL_SCHEME}{location}"))
    }
}
