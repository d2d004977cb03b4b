use std::io;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::error::TaskError;
use super::pattern::IgnoreSpec;
use super::scanner::is_skipped_folder;
use super::types::{DirectoryRef, ScanOptions};

/// Counts directories below `root` (the root itself excluded) down to
/// `options.max_depth`. Used only as the denominator for scan progress.
///
/// Folders the scanner would skip are counted but not descended into, so the
/// count matches the number of directories a scan visits. Any unreadable
/// directory aborts the count; there is no partial result.
pub fn count_directories(
    root: &Path,
    options: &ScanOptions,
    ignore_folders: &IgnoreSpec,
    cancel: &CancellationToken,
) -> Result<u64, TaskError> {
    let walker = WalkDir::new(root).min_depth(1).follow_links(false);
    let walker = match options.max_depth {
        Some(depth) => walker.max_depth(depth),
        None => walker,
    };

    let mut count = 0u64;
    let mut entries = walker.into_iter();
    while let Some(entry) = entries.next() {
        let entry = entry.map_err(|e| walk_error(e, root))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        count += 1;

        let metadata = entry.metadata().map_err(|e| walk_error(e, root))?;
        let dir = DirectoryRef::from_metadata(entry.path(), &metadata);
        if is_skipped_folder(&dir, options, ignore_folders) {
            entries.skip_current_dir();
        }
    }

    log::debug!("counted {} directories under {}", count, root.display());
    Ok(count)
}

fn walk_error(err: walkdir::Error, root: &Path) -> TaskError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
    TaskError::filesystem(path, source)
}
