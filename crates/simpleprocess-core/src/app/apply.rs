//! Apply - JobResult を metadata store に反映
//!
//! Attributes first, then each artifact in order. The first failure stops the
//! sequence; nothing is rolled back.

use tracing::debug;

use crate::domain::{JobContext, JobResult, MetadataError};
use crate::ports::Metadata;

/// `result` を metadata に書き込む
///
/// # Example
/// ```ignore
/// if let Some(result) = SyncRunner.run(&ctx, uow.as_ref(), &job).await? {
///     apply_result(metadata.as_ref(), &ctx, &result).await?;
/// }
/// ```
pub async fn apply_result(
    metadata: &dyn Metadata,
    ctx: &JobContext,
    result: &JobResult,
) -> Result<(), MetadataError> {
    metadata
        .update_file_attributes(ctx, &result.file_id, &result.attributes_patch)
        .await?;
    for artifact in &result.artifacts {
        metadata.create_artifact(ctx, &result.file_id, artifact).await?;
    }
    debug!(
        job_id = %result.job_id,
        file_id = %result.file_id,
        attributes = result.attributes_patch.len(),
        artifacts = result.artifacts.len(),
        "result applied"
    );
    Ok(())
}
