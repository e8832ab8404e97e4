//! Job contract: what to run and on which data.

use serde::{Deserialize, Serialize};

/// Where a blob lives in the storage collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub location: String,
}

/// The file a job operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub blob: BlobRef,
}

impl FileRef {
    /// file id と blob location から作成
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blob: BlobRef {
                location: location.into(),
            },
        }
    }
}

/// Delivery target for the job's result (e.g. `"metadata"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnTarget {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ReturnTarget {
    /// 結果を metadata store に返す (`"metadata"`)
    pub fn metadata() -> Self {
        Self {
            kind: "metadata".to_string(),
        }
    }
}

/// A single submission. Immutable once built.
///
/// `idem_key` is carried for higher layers; nothing here deduplicates on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "jobID")]
    pub job_id: String,

    /// Absent on the wire means empty; the worker then reports no such UoW.
    #[serde(default)]
    pub uow: String,

    #[serde(default)]
    pub file: FileRef,

    #[serde(rename = "return", default)]
    pub return_to: ReturnTarget,

    #[serde(rename = "idemKey", default, skip_serializing_if = "String::is_empty")]
    pub idem_key: String,
}

impl Job {
    /// return / idemKey を空にした job を作る。
    ///
    /// # Example
    /// ```ignore
    /// use simpleprocess_core::domain::{FileRef, Job, ReturnTarget};
    ///
    /// let job = Job::new("job-1", "hash", FileRef::new("file-1", "inbox/a.txt"))
    ///     .with_return(ReturnTarget::metadata())
    ///     .with_idem_key("file-1-hash");
    /// assert_eq!(job.location(), "inbox/a.txt");
    /// ```
    pub fn new(job_id: impl Into<String>, uow: impl Into<String>, file: FileRef) -> Self {
        Self {
            job_id: job_id.into(),
            uow: uow.into(),
            file,
            return_to: ReturnTarget::default(),
            idem_key: String::new(),
        }
    }

    /// 結果の返却先を設定
    pub fn with_return(mut self, return_to: ReturnTarget) -> Self {
        self.return_to = return_to;
        self
    }

    /// 冪等キーを設定
    pub fn with_idem_key(mut self, key: impl Into<String>) -> Self {
        self.idem_key = key.into();
        self
    }

    /// Shorthand for `file.blob.location`.
    pub fn location(&self) -> &str {
        &self.file.blob.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_serializes_with_contract_field_names() {
        let job = Job::new("job-1", "hash", FileRef::new("file-1", "a.txt"))
            .with_return(ReturnTarget::metadata())
            .with_idem_key("file-1-hash");

        let v = serde_json::to_value(&job).unwrap();
        assert_eq!(
            v,
            json!({
                "jobID": "job-1",
                "uow": "hash",
                "file": { "id": "file-1", "blob": { "location": "a.txt" } },
                "return": { "type": "metadata" },
                "idemKey": "file-1-hash",
            })
        );
    }

    #[test]
    fn optional_sections_default_when_absent() {
        let job: Job = serde_json::from_value(json!({ "jobID": "x", "uow": "hash" })).unwrap();
        assert_eq!(job.file, FileRef::default());
        assert_eq!(job.return_to, ReturnTarget::default());
        assert!(job.idem_key.is_empty());
    }

    #[test]
    fn missing_uow_decodes_as_empty() {
        let job: Job = serde_json::from_value(json!({ "jobID": "x" })).unwrap();
        assert_eq!(job.job_id, "x");
        assert!(job.uow.is_empty());
    }

    #[test]
    fn job_id_is_required_on_the_wire() {
        let res = serde_json::from_value::<Job>(json!({ "uow": "hash" }));
        assert!(res.is_err());
    }
}
