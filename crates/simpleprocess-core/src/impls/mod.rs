//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **MemoryBus**: bounded in-process bus + subscription
//! - **WireBus / subscribe_worker**: envelope codec over a [`Transport`](crate::ports::Transport)
//! - **MemoryTransport**: subject / queue group broker in one process
//! - **MemoryStorage / MemoryMetadata**: reference collaborators
//!
//! Object-store storage and real messaging clients belong in downstream
//! crates that implement the same ports.

pub mod memory_bus;
pub mod memory_metadata;
pub mod memory_storage;
pub mod memory_transport;
pub mod wire_bus;

pub use self::memory_bus::{MemoryBus, MemorySubscription};
pub use self::memory_metadata::{MemoryMetadata, MetadataSnapshot};
pub use self::memory_storage::{MEMORY_URL_SCHEME, MemoryStorage};
pub use self::memory_transport::MemoryTransport;
pub use self::wire_bus::{
    DEFAULT_QUEUE_GROUP, MIN_FLUSH_TIMEOUT, WireBus, WireSubscription, flush_timeout,
    subscribe_worker,
};
