//! MemoryTransport - プロセス内の subject / queue group ブローカー
//!
//! Stands in for a real messaging client in tests and demos:
//! - every queue group subscribed to a subject receives each message once,
//!   handed to its members round-robin
//! - a subject nobody subscribed to drops the message
//! - `flush` records the timeout it was asked to honour

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

use crate::domain::TransportError;
use crate::ports::{Inbox, Transport};

/// Per-member inbox depth.
pub const INBOX_CAPACITY: usize = 256;

#[derive(Default)]
struct Group {
    members: Vec<mpsc::Sender<Vec<u8>>>,
    next: usize,
}

impl Group {
    /// Prunes closed members, then reports whether `deliver` can succeed.
    /// An empty group accepts (and drops) everything.
    fn has_room(&mut self) -> bool {
        self.members.retain(|m| !m.is_closed());
        self.members.is_empty() || self.members.iter().any(|m| m.capacity() > 0)
    }

    /// Deliver to the next live member with room.
    fn deliver(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.members.retain(|m| !m.is_closed());
        let n = self.members.len();
        for _ in 0..n {
            let idx = self.next % n;
            self.next = self.next.wrapping_add(1);
            if self.members[idx].try_send(payload.to_vec()).is_ok() {
                return Ok(());
            }
        }
        if n == 0 {
            return Ok(());
        }
        Err(TransportError::Send("all group members are full".to_string()))
    }
}

/// MemoryTransport はプロセス内の subject / queue group ブローカー
///
/// # 学習ポイント
/// - send は全 group に空きがあるときだけ配送する (部分配送しない)
/// - group 内は round-robin、埋まっている member は飛ばす
#[derive(Default)]
pub struct MemoryTransport {
    subjects: Mutex<HashMap<String, HashMap<String, Group>>>,
    flushes: Mutex<Vec<Option<Duration>>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// 空のブローカーを作る。
    ///
    /// # Example
    /// ```ignore
    /// use simpleprocess_core::impls::MemoryTransport;
    /// let transport = MemoryTransport::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send / flush fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Drop all subscriptions; their inboxes end.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subjects.lock().await.clear();
    }

    /// Timeouts passed to `flush`, oldest first.
    pub async fn flush_log(&self) -> Vec<Option<Duration>> {
        self.flushes.lock().await.clone()
    }

    /// 指定 group の生きている member 数。
    pub async fn member_count(&self, subject: &str, group: &str) -> usize {
        self.subjects
            .lock()
            .await
            .get(subject)
            .and_then(|groups| groups.get(group))
            .map(|g| g.members.iter().filter(|m| !m.is_closed()).count())
            .unwrap_or(0)
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Send("transport unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, subject: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.check()?;
        let mut subjects = self.subjects.lock().await;
        let Some(groups) = subjects.get_mut(subject) else {
            trace!(subject, "no subscribers; message dropped");
            return Ok(());
        };
        // All or nothing: a full group must not leave earlier groups holding
        // a copy the caller will send again.
        for (name, group) in groups.iter_mut() {
            if !group.has_room() {
                trace!(subject, group = %name, "queue group full; message rejected");
                return Err(TransportError::Send(format!(
                    "all members of group {name} are full"
                )));
            }
        }
        for group in groups.values_mut() {
            group.deliver(&payload)?;
        }
        Ok(())
    }

    async fn flush(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.flushes.lock().await.push(timeout);
        self.check()
    }

    async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<Inbox, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.subjects
            .lock()
            .await
            .entry(subject.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .members
            .push(tx);
        Ok(rx)
    }
}
