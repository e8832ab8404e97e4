//! Metadata port - file attributes and artifact records.
//!
//! # 契約
//! - `update_file_attributes`: key-wise merge, last write wins per key,
//!   unrelated keys are kept, a missing file record is created.
//! - `create_artifact`: append to the file's ordered list, no de-duplication.
//! - Both must be safe to call concurrently for the same and for different files.

use async_trait::async_trait;

use crate::domain::{Artifact, Attributes, JobContext, MetadataError};

/// Metadata は file の attributes と artifacts を保持する
///
/// # 学習ポイント
/// - 実装ごとの排他制御は trait の外 (MemoryMetadata は単一 Mutex)
#[async_trait]
pub trait Metadata: Send + Sync {
    /// `patch` をキー単位でマージ
    async fn update_file_attributes(
        &self,
        ctx: &JobContext,
        file_id: &str,
        patch: &Attributes,
    ) -> Result<(), MetadataError>;

    /// artifact を末尾に追加
    async fn create_artifact(
        &self,
        ctx: &JobContext,
        file_id: &str,
        artifact: &Artifact,
    ) -> Result<(), MetadataError>;
}
