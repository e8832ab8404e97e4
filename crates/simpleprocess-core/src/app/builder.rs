//! WorkerBuilder - UoW registry と dispatcher のワイヤリング
//!
//! # Fail-fast
//! - `expect_uows()` で期待される UoW 名を宣言
//! - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば `BuildError::MissingUows` (不足名を全部列挙)

use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::Dispatcher;
use crate::ports::Metadata;
use crate::uow::{RegistryError, UnitOfWork, UowRegistry};

/// WorkerBuilder は起動時検証付きで Dispatcher を組み立てる
///
/// # 使用例
/// ```ignore
/// let dispatcher = WorkerBuilder::new()
///     .register("hash", Arc::new(HashUow::new(storage)))?
///     .expect_uows(&["hash"])
///     .build(metadata)?;
/// ```
pub struct WorkerBuilder {
    registry: UowRegistry,
    expected_uows: Option<Vec<String>>,
    job_timeout: Option<Duration>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing uows: {0:?}. These uows were expected but not registered.")]
    MissingUows(Vec<String>),
}

impl WorkerBuilder {
    /// 新しい WorkerBuilder を作成
    pub fn new() -> Self {
        Self {
            registry: UowRegistry::new(),
            expected_uows: None,
            job_timeout: None,
        }
    }

    /// UoW を登録
    ///
    /// # Example
    /// ```ignore
    /// builder.register("hash", Arc::new(HashUow::new(storage)))?;
    /// ```
    pub fn register(
        mut self,
        name: impl Into<String>,
        uow: Arc<dyn UnitOfWork>,
    ) -> Result<Self, RegistryError> {
        self.registry.register(name, uow)?;
        Ok(self)
    }

    /// build() 時に必須とする UoW 名を設定
    ///
    /// # Example
    /// ```ignore
    /// builder.expect_uows(&["hash", "wordcount"]);
    /// ```
    pub fn expect_uows(mut self, names: &[&str]) -> Self {
        self.expected_uows = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// job ごとのタイムアウト。`None` なら無制限
    pub fn job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Freeze the registry and wire it to `metadata`.
    pub fn build(self, metadata: Arc<dyn Metadata>) -> Result<Dispatcher, BuildError> {
        if let Some(expected) = &self.expected_uows {
            let registered = self.registry.names();
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !registered.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingUows(missing));
            }
        }
        Ok(Dispatcher::new(Arc::new(self.registry), metadata).with_job_timeout(self.job_timeout))
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
