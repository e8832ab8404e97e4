//! App - アプリケーション層
//!
//! ports / uow を組み合わせて job の実行経路を組み立てます。
//!
//! # 主要コンポーネント
//! - **Runner**: SyncRunner (in-process) / AsyncRunner (bus 経由)
//! - **Dispatcher**: registry lookup → 実行 → metadata 反映
//! - **WorkerLoop / WorkerGroup**: bus から job を受けて Dispatcher に流す
//! - **WorkerBuilder**: 起動時検証付きのワイヤリング

pub mod apply;
pub mod builder;
pub mod dispatcher;
pub mod runner;
pub mod worker_loop;

pub use self::apply::apply_result;
pub use self::builder::{BuildError, WorkerBuilder};
pub use self::dispatcher::Dispatcher;
pub use self::runner::{AsyncRunner, Runner, SyncRunner};
pub use self::worker_loop::{FailurePolicy, JobFailure, WorkerExit, WorkerGroup, WorkerLoop};
