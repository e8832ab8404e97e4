//! IdGenerator port - job id 生成の抽象化
//!
//! Callers may bring their own job ids; this is for the ones that do not.
//!
//! # 実装
//! - **UlidGenerator**: `job-<ULID>`（時刻でソート可能、調整なしで分散生成可能）

use ulid::Ulid;

use crate::ports::Clock;

/// Prefix of generated job ids.
pub const JOB_ID_PREFIX: &str = "job-";

/// job id の生成器
pub trait IdGenerator: Send + Sync {
    /// `job-` で始まる一意な id
    fn generate_job_id(&self) -> String;
}

/// ULID-backed generator.
///
/// The timestamp part comes from the injected clock, the rest is random, so a
/// `FixedClock` yields distinct ids sharing one timestamp.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    /// `clock` のタイムスタンプで ULID を作る生成器
    ///
    /// # Example
    /// ```ignore
    /// let ids = UlidGenerator::new(SystemClock);
    /// let job = Job::new(ids.generate_job_id(), "hash", file);
    /// ```
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> String {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        format!("{JOB_ID_PREFIX}{ulid}")
    }
}
