use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::time::sleep;

use super::pattern::IgnoreSpec;
use super::protected::ProtectedFolderRegistry;
use super::types::{DeleteOptions, DeleteProgress, DeletionOutcome, DeletionSummary, DirectoryRef};

/// Removes a single directory that is already empty. Implementations must
/// report failure through the result, never panic.
pub trait DirectoryRemover: Send + Sync {
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// Plain non-recursive removal; a directory that still has content fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRemover;

impl DirectoryRemover for FsRemover {
    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Deletes a scanned list of empty directories one at a time, in discovery
/// order. Failures are recorded per directory and never abort the batch.
pub struct DeletionExecutor<'a> {
    remover: &'a dyn DirectoryRemover,
    ignore_files: &'a IgnoreSpec,
    options: &'a DeleteOptions,
}

impl<'a> DeletionExecutor<'a> {
    pub fn new(
        remover: &'a dyn DirectoryRemover,
        ignore_files: &'a IgnoreSpec,
        options: &'a DeleteOptions,
    ) -> Self {
        Self {
            remover,
            ignore_files,
            options,
        }
    }

    /// Run over `folders`. `stop` is checked before each directory; directories
    /// already handled keep their outcome and the rest are left untouched.
    pub async fn run(
        &self,
        folders: &[DirectoryRef],
        protected: &Mutex<ProtectedFolderRegistry>,
        stop: &AtomicBool,
        progress: Option<&(dyn Fn(&DeleteProgress) + Send + Sync)>,
    ) -> DeletionSummary {
        let total = folders.len();
        let mut summary = DeletionSummary::default();

        for (index, folder) in folders.iter().enumerate() {
            if stop.load(Ordering::SeqCst) {
                summary.stopped = true;
                log::info!("deletion stopped after {} of {} directories", index, total);
                break;
            }

            let is_protected = protected
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .contains(&folder.path);

            let outcome = if is_protected {
                DeletionOutcome::Protected
            } else if self.delete_one(&folder.path) {
                summary.deleted_count += 1;
                DeletionOutcome::Deleted
            } else {
                summary.failed_count += 1;
                DeletionOutcome::Failed
            };

            if let Some(cb) = progress {
                cb(&DeleteProgress {
                    index,
                    path: folder.path.clone(),
                    outcome,
                    total,
                });
            }

            if outcome != DeletionOutcome::Protected {
                self.pause().await;
            }
        }

        summary
    }

    fn delete_one(&self, path: &Path) -> bool {
        if self.options.simulate {
            return true;
        }
        if !path.exists() {
            log::debug!("{} vanished before deletion", path.display());
            return true;
        }
        self.remove_ignored_files(path);
        match self.remover.remove_dir(path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to remove {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Delete the ignorable files that didn't count against emptiness.
    fn remove_ignored_files(&self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("failed to list {}: {}", dir.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(true);
            if is_dir {
                continue;
            }
            let path = entry.path();
            let size_is_zero = entry.metadata().map(|m| m.len() == 0).unwrap_or(false);
            let name = entry.file_name();
            if !self.ignore_files.matches(
                &name.to_string_lossy(),
                size_is_zero,
                self.options.ignore_zero_byte_files,
            ) {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("failed to remove ignored file {}: {}", path.display(), e);
            }
        }
    }

    async fn pause(&self) {
        if self.options.inter_delete_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            sleep(self.options.inter_delete_delay).await;
        }
    }
}
