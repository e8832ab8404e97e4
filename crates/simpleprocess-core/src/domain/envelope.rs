//! JobEnvelope - CloudEvents-shaped wire form of a [`Job`].
//!
//! The envelope only exists at the bus boundary: a producer wraps the job with
//! [`JobEnvelope::encode`], the consumer unwraps it with [`JobEnvelope::decode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CodecError;
use super::job::Job;
use crate::ports::Clock;

pub const SPEC_VERSION: &str = "1.0";
pub const JOB_EVENT_TYPE: &str = "simpleprocess.job";
pub const JOB_CONTENT_TYPE: &str = "application/json";

/// Source used when the producer does not name itself.
pub const DEFAULT_SOURCE: &str = "simple-process";

/// JobEnvelope は CloudEvents 形式の job ラッパー
///
/// `id` は job id と同じ。`data` は job の JSON そのもの。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    #[serde(rename = "specversion")]
    pub spec_version: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub source: String,

    /// Equals the wrapped job's id.
    pub id: String,

    /// Producers always stamp it; a missing value reads as the Unix epoch.
    #[serde(default)]
    pub time: DateTime<Utc>,

    #[serde(rename = "datacontenttype")]
    pub data_content_type: String,

    pub data: serde_json::Value,
}

impl JobEnvelope {
    /// Wrap `job`, stamping the current UTC time.
    pub fn encode(source: &str, job: &Job) -> Result<Self, CodecError> {
        Self::encode_at(source, job, Utc::now())
    }

    /// Wrap `job`, stamping the time reported by `clock`.
    pub fn encode_with_clock(source: &str, job: &Job, clock: &dyn Clock) -> Result<Self, CodecError> {
        Self::encode_at(source, job, clock.now())
    }

    fn encode_at(source: &str, job: &Job, time: DateTime<Utc>) -> Result<Self, CodecError> {
        if job.job_id.is_empty() {
            return Err(CodecError::MissingJobId);
        }
        let data = serde_json::to_value(job).map_err(CodecError::Serialize)?;
        let source = if source.is_empty() { DEFAULT_SOURCE } else { source };

        Ok(Self {
            spec_version: SPEC_VERSION.to_string(),
            event_type: JOB_EVENT_TYPE.to_string(),
            source: source.to_string(),
            id: job.job_id.clone(),
            time,
            data_content_type: JOB_CONTENT_TYPE.to_string(),
            data,
        })
    }

    /// Unwrap the job. Content type must match exactly; the payload either
    /// deserializes completely or not at all.
    pub fn decode(&self) -> Result<Job, CodecError> {
        if self.data_content_type != JOB_CONTENT_TYPE {
            return Err(CodecError::UnsupportedContentType(
                self.data_content_type.clone(),
            ));
        }
        Job::deserialize(&self.data).map_err(CodecError::MalformedPayload)
    }

    /// Wire representation.
    ///
    /// # Example
    /// ```ignore
    /// use simpleprocess_core::domain::{FileRef, Job, JobEnvelope};
    ///
    /// let job = Job::new("job-1", "hash", FileRef::new("file-1", "a.txt"));
    /// let wire = JobEnvelope::encode("demo", &job).unwrap().to_bytes().unwrap();
    /// let back = JobEnvelope::from_bytes(&wire).unwrap().decode().unwrap();
    /// assert_eq!(back, job);
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Serialize)
    }

    /// `to_bytes` の逆。中身 (data) の検証は `decode` まで遅らせる。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::MalformedPayload)
    }
}
