//! JobContext - cancellation and deadline carrier.
//!
//! Every blocking operation in the core (bus publish, UoW I/O, flush) takes a
//! `&JobContext` and races its work against [`JobContext::done`].
//!
//! - Child contexts share cancellation with their parent (token hierarchy).
//! - The earliest deadline in the chain wins.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// JobContext はキャンセルと deadline をまとめて運ぶ
///
/// # Example
/// ```ignore
/// let ctx = JobContext::background().with_timeout(Duration::from_secs(5));
/// let digest = ctx.run_until(read_all(&mut reader)).await??;
/// ```
///
/// # 学習ポイント
/// - キャンセルは `CancellationToken` の親子関係で伝播
/// - 子の deadline は親より後ろにならない
#[derive(Debug, Clone)]
pub struct JobContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl JobContext {
    /// A context that is never cancelled unless `cancel()` is called on it.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Wrap an existing token (e.g. a process-wide shutdown token).
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child context expiring `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Child context expiring at `at` (or earlier if the parent does).
    pub fn with_deadline(&self, at: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < at => parent,
            _ => at,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Child context sharing the parent's deadline but cancellable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// この context と子孫をキャンセル
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// 実効 deadline (親のほうが早ければ親)
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 明示的なキャンセルだけを見たいときに使う
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Non-blocking check. `None` while the context is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(at) => {
                tokio::select! {
                    _ = self.token.cancelled() => ContextError::Cancelled,
                    _ = tokio::time::sleep_until(at) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }

    /// Run `fut` unless the context finishes first; an already-finished
    /// context never polls `fut`.
    pub async fn run_until<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

impl Default for JobContext {
    fn default() -> Self {
        Self::background()
    }
}
