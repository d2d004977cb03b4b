// src/empty_dirs/scanner.rs

use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::TaskError;
use super::pattern::IgnoreSpec;
use super::types::{DirectoryRef, ScanEvent, ScanOptions, ScanSummary};
use crate::ops::ProgressTracker;

/// Depth-first, post-order search for empty directories.
///
/// A directory is empty when every file directly inside it matches the
/// ignore-file spec and every subdirectory was itself classified empty.
/// Children are reported before their parent, so the resulting list can be
/// deleted front to back.
pub struct EmptyDirScanner<'a> {
    options: &'a ScanOptions,
    ignore_files: &'a IgnoreSpec,
    ignore_folders: &'a IgnoreSpec,
    cancel: &'a CancellationToken,
    events: Option<mpsc::Sender<ScanEvent>>,
    progress: ProgressTracker,
    found: Vec<DirectoryRef>,
}

impl<'a> EmptyDirScanner<'a> {
    pub fn new(
        options: &'a ScanOptions,
        ignore_files: &'a IgnoreSpec,
        ignore_folders: &'a IgnoreSpec,
        cancel: &'a CancellationToken,
    ) -> Self {
        EmptyDirScanner {
            options,
            ignore_files,
            ignore_folders,
            cancel,
            events: None,
            progress: ProgressTracker::default(),
            found: Vec::new(),
        }
    }

    /// Stream `Found` and `Progress` events while walking. Progress percentages
    /// are computed against `total_dirs` when known.
    pub fn with_events(mut self, events: mpsc::Sender<ScanEvent>, total_dirs: Option<u64>) -> Self {
        self.events = Some(events);
        self.progress = ProgressTracker::new(total_dirs);
        self
    }

    /// Walk `root`. Must run off the async executor: sends block when the
    /// event channel is full.
    pub fn run(mut self, root: &Path) -> Result<ScanSummary, TaskError> {
        let entries = read_sorted(root)?;
        if self.options.max_depth != Some(0) {
            for entry in entries.iter().filter(|e| e.file_type.is_dir()) {
                self.visit(&entry.path, 1)?;
            }
        }
        // A cancel that lands after the last visit leaves the result intact
        Ok(ScanSummary {
            empty_folders: self.found,
            total_count: self.progress.visited() as usize,
        })
    }

    /// Returns whether `dir` was classified empty.
    fn visit(&mut self, dir: &Path, depth: usize) -> Result<bool, TaskError> {
        if self.cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        self.report_progress();

        let metadata = fs::metadata(dir).map_err(|e| TaskError::filesystem(dir, e))?;
        let mut dir_ref = DirectoryRef::from_metadata(dir, &metadata);
        if is_skipped_folder(&dir_ref, self.options, self.ignore_folders) {
            log::debug!("skipping {}", dir.display());
            return Ok(false);
        }

        let entries = read_sorted(dir)?;
        dir_ref.entry_count = entries.len();

        let mut blocked = false;
        for entry in &entries {
            if entry.file_type.is_dir() {
                let below_limit = self.options.max_depth.map_or(true, |max| depth < max);
                // Unvisited subdirectories count as content
                if !below_limit || !self.visit(&entry.path, depth + 1)? {
                    blocked = true;
                }
            } else if !blocked && !self.is_ignorable_file(entry)? {
                blocked = true;
            }
        }

        if blocked {
            return Ok(false);
        }
        self.report_found(dir_ref);
        Ok(true)
    }

    fn is_ignorable_file(&self, entry: &Entry) -> Result<bool, TaskError> {
        let size_is_zero = if self.options.ignore_zero_byte_files {
            fs::symlink_metadata(&entry.path)
                .map_err(|e| TaskError::filesystem(&entry.path, e))?
                .len()
                == 0
        } else {
            false
        };
        let name = entry.path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        Ok(self
            .ignore_files
            .matches(&name, size_is_zero, self.options.ignore_zero_byte_files))
    }

    fn report_progress(&mut self) {
        let Some(percent) = self.progress.tick() else {
            return;
        };
        if let Some(tx) = &self.events {
            // Progress is cosmetic; drop it rather than stall the walk
            if tx.try_send(ScanEvent::Progress(percent)).is_err() {
                log::debug!("dropped scan progress event ({}%)", percent);
            }
        }
    }

    fn report_found(&mut self, dir: DirectoryRef) {
        if let Some(tx) = &self.events {
            if tx.blocking_send(ScanEvent::Found(dir.clone())).is_err() {
                log::debug!("scan event receiver closed");
            }
        }
        self.found.push(dir);
    }
}

/// Whether a directory is left alone without looking inside it. The scanner
/// treats such a directory as non-empty and the counter does not descend.
pub(crate) fn is_skipped_folder(
    dir: &DirectoryRef,
    options: &ScanOptions,
    ignore_folders: &IgnoreSpec,
) -> bool {
    if options.ignore_hidden_folders && dir.hidden {
        return true;
    }
    if options.keep_system_folders && dir.system {
        return true;
    }
    if ignore_folders.is_empty() {
        return false;
    }
    let name = dir
        .path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    ignore_folders.matches_name(&name) || ignore_folders.matches_name(&dir.path.to_string_lossy())
}

struct Entry {
    path: PathBuf,
    file_type: fs::FileType,
}

/// Directory listing sorted by name so repeated walks produce the same order.
fn read_sorted(dir: &Path) -> Result<Vec<Entry>, TaskError> {
    let reader = fs::read_dir(dir).map_err(|e| TaskError::filesystem(dir, e))?;
    let mut entries = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| TaskError::filesystem(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| TaskError::filesystem(entry.path(), e))?;
        entries.push(Entry {
            path: entry.path(),
            file_type,
        });
    }
    entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(entries)
}
