//! Worker configuration: defaults plus `SIMPLEPROCESS_*` environment overrides.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::FailurePolicy;
use crate::domain::DEFAULT_SOURCE;
use crate::impls::DEFAULT_QUEUE_GROUP;

pub const DEFAULT_SUBJECT: &str = "simple-process.jobs";
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

pub const ENV_CONCURRENCY: &str = "SIMPLEPROCESS_CONCURRENCY";
pub const ENV_QUEUE_CAPACITY: &str = "SIMPLEPROCESS_QUEUE_CAPACITY";
pub const ENV_SUBJECT: &str = "SIMPLEPROCESS_SUBJECT";
pub const ENV_QUEUE_GROUP: &str = "SIMPLEPROCESS_QUEUE_GROUP";
pub const ENV_SOURCE: &str = "SIMPLEPROCESS_SOURCE";
pub const ENV_FAILURE_POLICY: &str = "SIMPLEPROCESS_FAILURE_POLICY";
pub const ENV_JOB_TIMEOUT_MS: &str = "SIMPLEPROCESS_JOB_TIMEOUT_MS";

/// ConfigError は設定の読み込み・検証エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// WorkerConfig は worker プロセスの設定
///
/// デフォルト値に環境変数 (`SIMPLEPROCESS_*`) を重ねて作る。
///
/// # Example
/// ```ignore
/// let config = WorkerConfig::from_env()?;
/// let group = WorkerGroup::spawn(config.concurrency, &template, &ctx);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker loops per process.
    pub concurrency: usize,
    /// In-memory bus capacity.
    pub queue_capacity: usize,
    pub subject: String,
    pub queue_group: String,
    /// Envelope `source` for published jobs.
    pub source: String,
    pub failure_policy: FailurePolicy,
    pub job_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            subject: DEFAULT_SUBJECT.to_string(),
            queue_group: DEFAULT_QUEUE_GROUP.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            failure_policy: FailurePolicy::Continue,
            job_timeout: None,
        }
    }
}

impl WorkerConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = WorkerConfig::default();

        if let Some(v) = lookup(ENV_CONCURRENCY) {
            config.concurrency = parse(ENV_CONCURRENCY, &v)?;
        }
        if let Some(v) = lookup(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = parse(ENV_QUEUE_CAPACITY, &v)?;
        }
        if let Some(v) = lookup(ENV_SUBJECT) {
            config.subject = v;
        }
        if let Some(v) = lookup(ENV_QUEUE_GROUP) {
            config.queue_group = v;
        }
        if let Some(v) = lookup(ENV_SOURCE) {
            config.source = v;
        }
        if let Some(v) = lookup(ENV_FAILURE_POLICY) {
            config.failure_policy = v
                .parse()
                .map_err(|msg: String| ConfigError::invalid(ENV_FAILURE_POLICY, msg))?;
        }
        if let Some(v) = lookup(ENV_JOB_TIMEOUT_MS) {
            let ms: u64 = parse(ENV_JOB_TIMEOUT_MS, &v)?;
            config.job_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }

    /// 値の整合性を検証
    ///
    /// # 検証
    /// - concurrency / queue_capacity は 1 以上
    /// - subject は空白のみ不可
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid("queue_capacity", "must be at least 1"));
        }
        if self.subject.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "subject".to_string(),
                hint: format!("Set {ENV_SUBJECT} or leave it unset for the default."),
            });
        }
        Ok(())
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("'{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = WorkerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.subject, "simple-process.jobs");
        assert_eq!(config.queue_group, "simple-process-workers");
        assert_eq!(config.source, "simple-process");
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn overrides_apply() {
        let config = WorkerConfig::from_lookup(lookup(&[
            (ENV_CONCURRENCY, "4"),
            (ENV_QUEUE_CAPACITY, " 32 "),
            (ENV_SUBJECT, "jobs.hash"),
            (ENV_QUEUE_GROUP, "hashers"),
            (ENV_SOURCE, "ingest"),
            (ENV_FAILURE_POLICY, "stop"),
            (ENV_JOB_TIMEOUT_MS, "1500"),
        ]))
        .unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.subject, "jobs.hash");
        assert_eq!(config.queue_group, "hashers");
        assert_eq!(config.source, "ingest");
        assert_eq!(config.failure_policy, FailurePolicy::Stop);
        assert_eq!(config.job_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn zero_timeout_means_none() {
        let config = WorkerConfig::from_lookup(lookup(&[(ENV_JOB_TIMEOUT_MS, "0")])).unwrap();
        assert_eq!(config.job_timeout, None);
    }

    #[rstest]
    #[case(ENV_CONCURRENCY, "many")]
    #[case(ENV_CONCURRENCY, "0")]
    #[case(ENV_QUEUE_CAPACITY, "-1")]
    #[case(ENV_QUEUE_CAPACITY, "0")]
    #[case(ENV_FAILURE_POLICY, "retry")]
    #[case(ENV_JOB_TIMEOUT_MS, "soon")]
    fn bad_values_are_rejected(#[case] key: &str, #[case] value: &str) {
        let err = WorkerConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{err}");
    }

    #[test]
    fn empty_subject_is_missing() {
        let err = WorkerConfig::from_lookup(lookup(&[(ENV_SUBJECT, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { key, .. } if key == "subject"));
    }
}
