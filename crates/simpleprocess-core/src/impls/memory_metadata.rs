//! MemoryMetadata - 開発・テスト用の metadata store
//!
//! One mutex guards both maps; that single serialization point is what makes
//! concurrent merges for the same file safe.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Artifact, Attributes, JobContext, MetadataError};
use crate::ports::Metadata;

#[derive(Default)]
struct MetadataState {
    attributes: HashMap<String, Attributes>,
    artifacts: HashMap<String, Vec<Artifact>>,
}

/// Point-in-time copy of the whole store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataSnapshot {
    pub attributes: HashMap<String, Attributes>,
    pub artifacts: HashMap<String, Vec<Artifact>>,
}

/// MemoryMetadata はプロセス内の metadata store
///
/// attributes は浅いマージ (同じキーは後勝ち)、artifacts は追記のみ。
///
/// # Example
/// ```ignore
/// let metadata = Arc::new(MemoryMetadata::new());
/// let dispatcher = WorkerBuilder::new().register("hash", uow)?.build(metadata.clone())?;
/// dispatcher.dispatch(&ctx, &job).await?;
/// assert!(metadata.attributes("file-1").await.is_some());
/// ```
#[derive(Default)]
pub struct MemoryMetadata {
    state: Mutex<MetadataState>,
}

impl MemoryMetadata {
    /// 空の store を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// file のマージ済み attributes。一度も書かれていなければ `None`
    pub async fn attributes(&self, file_id: &str) -> Option<Attributes> {
        self.state.lock().await.attributes.get(file_id).cloned()
    }

    /// file の artifacts (作成順)。無ければ空
    pub async fn artifacts(&self, file_id: &str) -> Vec<Artifact> {
        self.state
            .lock()
            .await
            .artifacts
            .get(file_id)
            .cloned()
            .unwrap_or_default()
    }

    /// store 全体のコピー
    pub async fn snapshot(&self) -> MetadataSnapshot {
        let state = self.state.lock().await;
        MetadataSnapshot {
            attributes: state.attributes.clone(),
            artifacts: state.artifacts.clone(),
        }
    }
}

#[async_trait]
impl Metadata for MemoryMetadata {
    async fn update_file_attributes(
        &self,
        ctx: &JobContext,
        file_id: &str,
        patch: &Attributes,
    ) -> Result<(), MetadataError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        let mut state = self.state.lock().await;
        let attrs = state.attributes.entry(file_id.to_string()).or_default();
        for (k, v) in patch {
            attrs.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn create_artifact(
        &self,
        ctx: &JobContext,
        file_id: &str,
        artifact: &Artifact,
    ) -> Result<(), MetadataError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        let mut state = self.state.lock().await;
        state
            .artifacts
            .entry(file_id.to_string())
            .or_default()
            .push(artifact.clone());
        Ok(())
    }
}
