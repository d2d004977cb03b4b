use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    #[default]
    Init,
    CountingDirectories,
    ScanningForEmptyDirs,
    Deleting,
}

/// A directory seen during a walk, with the metadata used to classify it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryRef {
    pub path: PathBuf,
    /// Number of direct children (files and directories) when the directory was read.
    pub entry_count: usize,
    pub hidden: bool,
    pub system: bool,
}

impl DirectoryRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DirectoryRef {
            path: path.into(),
            entry_count: 0,
            hidden: false,
            system: false,
        }
    }

    pub(crate) fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        DirectoryRef {
            path: path.to_path_buf(),
            entry_count: 0,
            hidden: is_hidden(path, metadata),
            system: is_system(metadata),
        }
    }
}

#[cfg(windows)]
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
#[cfg(windows)]
const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

fn is_hidden(path: &Path, _metadata: &Metadata) -> bool {
    let dot_named = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false);

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        dot_named || _metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
    }

    #[cfg(not(windows))]
    {
        dot_named
    }
}

fn is_system(_metadata: &Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        _metadata.file_attributes() & FILE_ATTRIBUTE_SYSTEM != 0
    }

    // No system attribute outside Windows
    #[cfg(not(windows))]
    {
        false
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOutcome {
    Deleted,
    Failed,
    Protected,
}

/// Options consumed by the empty-directory scanner. Ignore specs are passed
/// separately, already compiled.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Deepest level visited below the root (root children are level 1).
    /// `None` walks the whole tree.
    pub max_depth: Option<usize>,
    pub ignore_zero_byte_files: bool,
    pub ignore_hidden_folders: bool,
    pub keep_system_folders: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub ignore_zero_byte_files: bool,
    pub inter_delete_delay: Duration,
    pub simulate: bool,
}

/// Event streamed by the scanner while it walks.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Progress(u8),
    Found(DirectoryRef),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub empty_folders: Vec<DirectoryRef>,
    /// Directories visited below the root.
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteProgress {
    pub index: usize,
    pub path: PathBuf,
    pub outcome: DeletionOutcome,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct DeletionSummary {
    pub deleted_count: usize,
    pub failed_count: usize,
    /// True when a stop request ended the run before the list was exhausted.
    pub stopped: bool,
}

/// Everything the controller publishes to its subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    PhaseChanged { phase: WorkflowPhase },
    Error { message: String },
    CountingFinished { count: u64 },
    ScanProgress { percent: u8 },
    EmptyDirFound { path: PathBuf },
    ScanFinished { empty_count: usize, total_count: usize },
    DeleteProgress(DeleteProgress),
    DeleteFinished { deleted_count: usize, failed_count: usize },
    Cancelled,
}

impl WorkflowEvent {
    /// Events after which the phase's background work is over.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::Error { .. }
                | WorkflowEvent::CountingFinished { .. }
                | WorkflowEvent::ScanFinished { .. }
                | WorkflowEvent::DeleteFinished { .. }
                | WorkflowEvent::Cancelled
        )
    }
}
