//! Domain model: job/result contracts, the wire envelope, cancellation
//! context, worker status views and the error taxonomy.

pub mod context;
pub mod envelope;
pub mod errors;
pub mod job;
pub mod result;
pub mod status;

pub use self::context::{ContextError, JobContext};
pub use self::envelope::{DEFAULT_SOURCE, JOB_CONTENT_TYPE, JOB_EVENT_TYPE, JobEnvelope, SPEC_VERSION};
pub use self::errors::{
    BusError, CodecError, Error, ErrorKind, MetadataError, RunError, StorageError, TransportError,
    UowError, WorkerError,
};
pub use self::job::{BlobRef, FileRef, Job, ReturnTarget};
pub use self::result::{Artifact, Attributes, JobResult};
pub use self::status::{WorkerCounts, WorkerState, WorkerStats};
