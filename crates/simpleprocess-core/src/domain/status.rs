//! Status - worker の観測用ビュー
//!
//! Counters are updated lock-free by the loop and read as a [`WorkerCounts`]
//! snapshot. The loop's current step is published as a [`WorkerState`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// worker のカウンタのスナップショット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub unknown_uow: u64,
}

impl WorkerCounts {
    /// Jobs that finished, one way or the other.
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.unknown_uow
    }
}

/// WorkerStats は worker 間で共有するロックフリーなカウンタ
///
/// WorkerLoop と wire subscription の両方が使う。読むときは `snapshot()`。
#[derive(Debug, Default)]
pub struct WorkerStats {
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    unknown_uow: AtomicU64,
}

impl WorkerStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_uow(&self) {
        self.unknown_uow.fetch_add(1, Ordering::Relaxed);
    }

    /// 現在値を読む。各カウンタは独立に読むので厳密な一貫性はない
    pub fn snapshot(&self) -> WorkerCounts {
        WorkerCounts {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unknown_uow: self.unknown_uow.load(Ordering::Relaxed),
        }
    }
}

/// Where a worker loop currently is.
///
/// `Idle → Dispatching → Executing → Applying → Idle`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Dispatching,
    Executing,
    Applying,
    Stopped,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Idle => "idle",
            WorkerState::Dispatching => "dispatching",
            WorkerState::Executing => "executing",
            WorkerState::Applying => "applying",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = WorkerStats::default();
        stats.record_received();
        stats.record_received();
        stats.record_received();
        stats.record_succeeded();
        stats.record_failed();
        stats.record_unknown_uow();

        let counts = stats.snapshot();
        assert_eq!(
            counts,
            WorkerCounts {
                received: 3,
                succeeded: 1,
                failed: 1,
                unknown_uow: 1,
            }
        );
        assert_eq!(counts.settled(), 3);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&WorkerState::Dispatching).unwrap();
        assert_eq!(json, "\"dispatching\"");
        assert_eq!(WorkerState::Applying.to_string(), "applying");
        assert!(WorkerState::Stopped.is_terminal());
        assert!(!WorkerState::Idle.is_terminal());
    }
}
