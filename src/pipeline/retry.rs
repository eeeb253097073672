//! Retry bookkeeping and escalation notice timers.
//!
//! The attempt loop itself lives in the client; this module owns the
//! pieces it leans on: the per-send retry state and the tiered
//! informational timers armed on every `Attempting` entry.

use crate::observer::{Notice, TurnObserver};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Attempt counter scoped to one logical send; discarded on terminal
/// success or failure.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    /// Whether a retryable failure may re-enter `Attempting`.
    pub fn may_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// 1-based number of the attempt that just settled.
    pub fn settled_attempt(&self) -> u32 {
        self.attempt + 1
    }

    /// Total attempts the budget allows.
    pub fn total_attempts(&self) -> u32 {
        self.max_attempts + 1
    }
}

/// Escalating "still working" timers. Purely informational: they never
/// abort or retry anything, and all of them are disarmed the instant the
/// attempt settles, whichever branch it took.
pub(crate) struct NoticeTimers {
    handles: Vec<JoinHandle<()>>,
}

impl NoticeTimers {
    pub fn arm(schedule: &[Duration], observer: Arc<dyn TurnObserver>) -> Self {
        let handles = schedule
            .iter()
            .map(|&elapsed| {
                let observer = observer.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(elapsed).await;
                    observer.notice(Notice::StillWorking { elapsed });
                })
            })
            .collect();
        Self { handles }
    }

    pub fn disarm(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for NoticeTimers {
    fn drop(&mut self) {
        self.disarm();
    }
}
