//! UoW (unit of work) - 名前付きの処理ステップ
//!
//! A UoW consumes a [`Job`] and produces a [`JobResult`]. Implementations must
//! stop I/O promptly once the context is done.

pub mod hash;
pub mod registry;

pub use self::hash::HashUow;
pub use self::registry::{RegistryError, UowRegistry};

use async_trait::async_trait;

use crate::domain::{Job, JobContext, JobResult, UowError};

/// UnitOfWork は 1 種類の処理を表す
///
/// # 学習ポイント
/// - `async_trait` で `Arc<dyn UnitOfWork>` として registry に載せる
/// - ctx が done になったら I/O を打ち切り `UowError::Cancelled` を返す
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// job を処理して結果を返す。metadata への反映は呼び出し側の仕事
    async fn process(&self, ctx: &JobContext, job: &Job) -> Result<JobResult, UowError>;
}
