//! Errors - per-concern error types and their operational classification.
//!
//! Nothing here is fatal to the process: every failure is scoped to one job
//! (or one wiring call) and is surfaced either to the immediate caller or,
//! past the async boundary, through logs / the worker failure channel.

use super::context::ContextError;

/// ErrorKind classifies an error for operators.
///
/// - Validation: rejected before any I/O (missing job id, bad wiring).
/// - Decode: envelope could not be turned back into a job.
/// - Transport: publish / flush / connection failures.
/// - Storage: blob not found or unreadable inside a UoW.
/// - Handler: UoW-internal failure or unknown UoW name.
/// - Cancelled: the governing context was cancelled or timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Decode,
    Transport,
    Storage,
    Handler,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("job id is required")]
    MissingJobId,

    #[error("unexpected data content type: {0}")]
    UnsupportedContentType(String),

    #[error("decode job: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("serialize envelope: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::MissingJobId | CodecError::Serialize(_) => ErrorKind::Validation,
            CodecError::UnsupportedContentType(_) | CodecError::MalformedPayload(_) => {
                ErrorKind::Decode
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cancelled(#[from] ContextError),
}

#[derive(Debug, thiserror::Error)]
pub enum UowError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("uow failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Cancelled(#[from] ContextError),
}

impl UowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UowError::Storage(StorageError::Cancelled(_)) | UowError::Cancelled(_) => {
                ErrorKind::Cancelled
            }
            UowError::Storage(_) => ErrorKind::Storage,
            UowError::Handler(_) => ErrorKind::Handler,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("flush timed out after {0:?}")]
    FlushTimeout(std::time::Duration),

    #[error("transport closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("invalid bus wiring: {0}")]
    Validation(&'static str),

    #[error("bus is closed")]
    Closed,

    #[error("bus already closed")]
    AlreadyClosed,

    #[error(transparent)]
    Cancelled(#[from] ContextError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl BusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BusError::Validation(_) | BusError::AlreadyClosed => ErrorKind::Validation,
            BusError::Closed | BusError::Transport(_) => ErrorKind::Transport,
            BusError::Cancelled(_) => ErrorKind::Cancelled,
            BusError::Codec(e) => e.kind(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Cancelled(#[from] ContextError),
}

/// Error returned by a [`Runner`](crate::app::Runner).
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Uow(#[from] UowError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Uow(e) => e.kind(),
            RunError::Bus(e) => e.kind(),
        }
    }
}

/// Per-job failure inside the worker loop.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("no uow registered for {0:?}")]
    NoSuchUow(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("apply result: {0}")]
    Metadata(#[from] MetadataError),

    #[error("runner returned no result")]
    EmptyResult,
}

impl WorkerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::NoSuchUow(_) | WorkerError::EmptyResult => ErrorKind::Handler,
            WorkerError::Run(e) => e.kind(),
            WorkerError::Metadata(MetadataError::Cancelled(_)) => ErrorKind::Cancelled,
            WorkerError::Metadata(_) => ErrorKind::Storage,
        }
    }
}

/// Umbrella error for callers that mix several components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("run error: {0}")]
    Run(#[from] RunError),

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("registry error: {0}")]
    Registry(#[from] crate::uow::RegistryError),

    #[error("build error: {0}")]
    Build(#[from] crate::app::BuildError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Codec(e) => e.kind(),
            Error::Bus(e) => e.kind(),
            Error::Run(e) => e.kind(),
            Error::Worker(e) => e.kind(),
            Error::Metadata(MetadataError::Cancelled(_)) => ErrorKind::Cancelled,
            Error::Metadata(_) => ErrorKind::Storage,
            Error::Storage(StorageError::Cancelled(_)) => ErrorKind::Cancelled,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Registry(_) | Error::Build(_) | Error::Config(_) => ErrorKind::Validation,
        }
    }
}
