//! Ports - 抽象化レイヤー
//!
//! One trait per capability. Concrete adapters live in `impls` (in-memory) or
//! in downstream crates (object store, real messaging clients) and are swapped
//! by composition.

pub mod bus;
pub mod clock;
pub mod handler;
pub mod id_generator;
pub mod metadata;
pub mod storage;
pub mod transport;

pub use self::bus::{Bus, JobSource};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::handler::JobHandler;
pub use self::id_generator::{IdGenerator, JOB_ID_PREFIX, UlidGenerator};
pub use self::metadata::Metadata;
pub use self::storage::{BlobReader, Storage};
pub use self::transport::{Inbox, Transport};
