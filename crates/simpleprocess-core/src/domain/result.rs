//! Result contract: what a UoW hands back for metadata application.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::job::Job;

/// Attribute patch / stored attribute set. Values are arbitrary JSON.
pub type Attributes = HashMap<String, serde_json::Value>;

/// A derived output recorded against a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Free-form tag, e.g. `"checksum"`.
    pub kind: String,
    pub mime: String,
    /// Length of the artifact content in bytes.
    pub bytes: u64,
    pub location: String,
}

/// Outcome of one successful UoW execution. Consumed once by the apply step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(rename = "jobID")]
    pub job_id: String,

    pub uow: String,

    #[serde(rename = "fileID")]
    pub file_id: String,

    #[serde(rename = "attributesPatch", default)]
    pub attributes_patch: Attributes,

    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

impl JobResult {
    /// Empty result echoing the job's identity.
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            uow: job.uow.clone(),
            file_id: job.file.id.clone(),
            attributes_patch: Attributes::new(),
            artifacts: Vec::new(),
        }
    }

    /// attributes patch に 1 キー追加 (同じキーは上書き)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes_patch.insert(key.into(), value.into());
        self
    }

    /// artifact を追加
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileRef;

    #[test]
    fn for_job_echoes_identity() {
        let job = Job::new("job-9", "hash", FileRef::new("file-9", "x"));
        let result = JobResult::for_job(&job).with_attribute("size", 3);

        assert_eq!(result.job_id, "job-9");
        assert_eq!(result.uow, "hash");
        assert_eq!(result.file_id, "file-9");
        assert_eq!(result.attributes_patch["size"], 3);
        assert!(result.artifacts.is_empty());
    }

    #[test]
    fn artifacts_keep_insertion_order() {
        let a = |kind: &str| Artifact {
            kind: kind.to_string(),
            mime: "text/plain".to_string(),
            bytes: 1,
            location: format!("artifacts/{kind}"),
        };
        let result = JobResult::default()
            .with_artifact(a("first"))
            .with_artifact(a("second"));
        let kinds: Vec<_> = result.artifacts.iter().map(|x| x.kind.as_str()).collect();
        assert_eq!(kinds, vec!["first", "second"]);
    }
}
