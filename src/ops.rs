use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CountDirectories,
    ScanEmptyDirs,
    DeleteEmptyDirs,
}

/// The background task a controller currently owns. `done` is cancelled by a
/// drop guard inside the task, so it fires on panic too.
#[derive(Debug)]
pub(crate) struct ActiveTask {
    pub kind: TaskKind,
    pub token: CancellationToken,
    pub done: CancellationToken,
    pub started_at: Instant,
}

impl ActiveTask {
    pub fn new(kind: TaskKind, token: CancellationToken, done: CancellationToken) -> Self {
        Self {
            kind,
            token,
            done,
            started_at: Instant::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.done.is_cancelled()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Turns visited-directory counts into a percentage of a known total.
/// `tick` only reports when the integer percentage moves, so a large walk
/// doesn't flood the event channel.
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    visited: u64,
    total: Option<u64>,
    last_percent: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            visited: 0,
            total: total.filter(|t| *t > 0),
            last_percent: None,
        }
    }

    pub fn visited(&self) -> u64 {
        self.visited
    }

    pub fn tick(&mut self) -> Option<u8> {
        self.visited = self.visited.saturating_add(1);
        let total = self.total?;
        let percent = ((self.visited.min(total) * 100) / total) as u8;
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }
}
