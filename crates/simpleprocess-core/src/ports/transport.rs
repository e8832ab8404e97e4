//! Transport port - wire bus の下回り（raw bytes）
//!
//! The minimal primitive set a wire bus needs from a messaging client:
//! send bytes on a subject, flush with an optional timeout, and join a named
//! queue group on a subject.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::TransportError;

/// Raw inbound messages for one queue-group member.
pub type Inbox = mpsc::Receiver<Vec<u8>>;

/// Transport はメッセージングクライアントの最小インターフェース
///
/// # 学習ポイント
/// - bytes だけを扱い、envelope の codec は WireBus 側に置く
/// - Inbox は `mpsc::Receiver`。drop すれば group から外れる
#[async_trait]
pub trait Transport: Send + Sync {
    /// `subject` に bytes を送る。購読者がいなければ捨てる
    async fn send(&self, subject: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Wait until previously sent messages are handed off. `None` waits
    /// without bound.
    async fn flush(&self, timeout: Option<Duration>) -> Result<(), TransportError>;

    /// Join `group` on `subject`. Each message is delivered to one member of
    /// every group subscribed to the subject.
    async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<Inbox, TransportError>;
}
