use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ops::TaskKind;

/// A rule in an ignore string could not be compiled.
#[derive(Debug, Error)]
#[error("invalid ignore rule '{rule}': {source}")]
pub struct PatternError {
    pub rule: String,
    #[source]
    pub source: regex::Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("folder is not protected: {}", .0.display())]
    NotFound(PathBuf),
}

/// Terminal failure of a counting or scanning task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("cancelled")]
    Cancelled,
    #[error("failed to read {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("background task aborted: {0}")]
    Aborted(String),
}

impl TaskError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TaskError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] PatternError),
    #[error("a {0:?} task is still running")]
    Busy(TaskKind),
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
