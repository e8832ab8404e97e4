//! UowRegistry - name → UoW の対応表
//!
//! Built once (mutable), then shared read-only (`Arc<UowRegistry>`) by every
//! dispatcher. There is no process-global registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::UnitOfWork;

/// UowRegistry は UoW 名から実装を引く表
///
/// # 学習ポイント
/// - 構築中だけ `&mut`、共有後は `Arc` 越しの読み取り専用
/// - グローバルな登録表を持たない（テストごとに独立）
#[derive(Default, Clone)]
pub struct UowRegistry {
    uows: HashMap<String, Arc<dyn UnitOfWork>>,
}

/// 登録時のエラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("uow '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("uow name must not be empty")]
    EmptyName,
}

impl UowRegistry {
    /// 空の registry を作成
    pub fn new() -> Self {
        Self {
            uows: HashMap::new(),
        }
    }

    /// UoW を名前付きで登録
    ///
    /// 空の名前と重複登録はエラー。既存の登録は上書きしない。
    ///
    /// # Example
    /// ```ignore
    /// let mut registry = UowRegistry::new();
    /// registry.register("hash", Arc::new(HashUow::new(storage)))?;
    /// ```
    pub fn register(
        &mut self,
        name: impl Into<String>,
        uow: Arc<dyn UnitOfWork>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.uows.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.uows.insert(name, uow);
        Ok(())
    }

    /// 名前で UoW を引く。未登録なら `None`
    pub fn get(&self, name: &str) -> Option<Arc<dyn UnitOfWork>> {
        self.uows.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.uows.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.uows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uows.is_empty()
    }
}

impl std::fmt::Debug for UowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UowRegistry")
            .field("uows", &self.names())
            .finish()
    }
}
