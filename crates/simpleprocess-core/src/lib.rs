//! simpleprocess-core
//!
//! Job dispatch building blocks: a job names a unit of work (UoW) and a blob;
//! a runner executes it in-process or hands it to a bus; a worker loop on the
//! other side runs the UoW and applies its result to the metadata store.
//!
//! # モジュール構成
//! - **domain**: Job / JobResult / JobEnvelope, JobContext, worker status, errors
//! - **ports**: Storage, Metadata, Bus, Transport, JobHandler, Clock, IdGenerator
//! - **uow**: UnitOfWork trait, UowRegistry, HashUow
//! - **impls**: MemoryBus, WireBus, MemoryTransport, MemoryStorage, MemoryMetadata
//! - **app**: runners, dispatcher, worker loop, builder
//! - **config**: WorkerConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod uow;

pub use self::domain::{Error, ErrorKind};
