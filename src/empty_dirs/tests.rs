#[cfg(test)]
mod tests {
    use super::super::*;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn mkdir(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(&path).unwrap();
        path
    }

    fn touch(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn scan_with(
        root: &Path,
        options: &ScanOptions,
        ignore_files: &str,
        ignore_folders: &str,
    ) -> Result<ScanSummary, TaskError> {
        let files = IgnoreSpec::compile(ignore_files).unwrap();
        let folders = IgnoreSpec::compile(ignore_folders).unwrap();
        let token = CancellationToken::new();
        EmptyDirScanner::new(options, &files, &folders, &token).run(root)
    }

    fn scan(root: &Path, ignore_files: &str) -> ScanSummary {
        scan_with(root, &ScanOptions::default(), ignore_files, "").unwrap()
    }

    fn found_names(summary: &ScanSummary, root: &Path) -> Vec<String> {
        summary
            .empty_folders
            .iter()
            .map(|d| d.path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    // Scanner

    #[test]
    fn test_scan_finds_leaf_and_ignorable_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "A");
        touch(root, "B/file.txt", b"keep me");
        touch(root, "C/ignored.tmp", b"scratch");

        let summary = scan(root, "*.tmp");
        assert_eq!(found_names(&summary, root), vec!["A", "C"]);
        assert_eq!(summary.total_count, 3);
    }

    #[test]
    fn test_scan_reports_children_before_parents() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "X/Y/Z");
        touch(root, "X/Y/thumbs.db", b"x");

        let summary = scan(root, "Thumbs.db");
        assert_eq!(found_names(&summary, root), vec!["X/Y/Z", "X/Y", "X"]);
        let y = &summary.empty_folders[1];
        assert_eq!(y.entry_count, 2);
    }

    #[test]
    fn test_scan_blocking_file_stops_chain() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "P/Q/R");
        touch(root, "P/Q/notes.txt", b"data");

        let summary = scan(root, "*.tmp");
        assert_eq!(found_names(&summary, root), vec!["P/Q/R"]);
    }

    #[test]
    fn test_scan_respects_max_depth() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "a/b/c");
        mkdir(root, "d");

        let options = ScanOptions {
            max_depth: Some(2),
            ..Default::default()
        };
        let summary = scan_with(root, &options, "", "").unwrap();
        // c sits at depth 3, so b keeps unvisited content
        assert_eq!(found_names(&summary, root), vec!["d"]);
        assert_eq!(summary.total_count, 3);

        let none = ScanOptions {
            max_depth: Some(0),
            ..Default::default()
        };
        let summary = scan_with(root, &none, "", "").unwrap();
        assert!(summary.empty_folders.is_empty());
        assert_eq!(summary.total_count, 0);
    }

    #[test]
    fn test_scan_hidden_folders_are_skipped_when_requested() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "outer/.cache");

        let skip_hidden = ScanOptions {
            ignore_hidden_folders: true,
            ..Default::default()
        };
        let summary = scan_with(root, &skip_hidden, "", "").unwrap();
        assert!(summary.empty_folders.is_empty());

        let summary = scan_with(root, &ScanOptions::default(), "", "").unwrap();
        assert_eq!(found_names(&summary, root), vec!["outer/.cache", "outer"]);
    }

    #[test]
    fn test_scan_ignore_folder_spec_skips_by_name_or_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "keep");
        mkdir(root, "pinned");
        mkdir(root, "plain");

        let pinned = root.join("pinned").to_string_lossy().into_owned();
        let summary = scan_with(
            root,
            &ScanOptions::default(),
            "",
            &format!("KEEP\n{}", pinned),
        )
        .unwrap();
        assert_eq!(found_names(&summary, root), vec!["plain"]);
    }

    #[test]
    fn test_scan_zero_byte_files_only_ignored_when_enabled() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "logs/empty.log", b"");

        let summary = scan_with(root, &ScanOptions::default(), "", "").unwrap();
        assert!(summary.empty_folders.is_empty());

        let options = ScanOptions {
            ignore_zero_byte_files: true,
            ..Default::default()
        };
        let summary = scan_with(root, &options, "", "").unwrap();
        assert_eq!(found_names(&summary, root), vec!["logs"]);
    }

    #[test]
    fn test_scan_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for name in ["m", "b", "z/y", "k/j/i", "c"] {
            mkdir(root, name);
        }
        touch(root, "k/note.md", b"#");

        let first = scan(root, "");
        let second = scan(root, "");
        assert_eq!(first.empty_folders, second.empty_folders);
        assert_eq!(found_names(&first, root), vec!["b", "c", "k/j/i", "k/j", "m", "z/y", "z"]);
    }

    #[test]
    fn test_scan_cancelled_and_missing_root() {
        let temp = TempDir::new().unwrap();
        mkdir(temp.path(), "a");
        let files = IgnoreSpec::default();
        let options = ScanOptions::default();
        let token = CancellationToken::new();
        token.cancel();
        let result = EmptyDirScanner::new(&options, &files, &files, &token).run(temp.path());
        assert!(matches!(result, Err(TaskError::Cancelled)));

        let missing = scan_with(&temp.path().join("gone"), &options, "", "");
        assert!(matches!(missing, Err(TaskError::Filesystem { .. })));
    }

    #[test]
    fn test_scan_with_no_directories_ignores_cancel() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "loose.txt", b"x");
        let files = IgnoreSpec::default();
        let options = ScanOptions::default();
        let token = CancellationToken::new();
        token.cancel();

        let summary = EmptyDirScanner::new(&options, &files, &files, &token)
            .run(temp.path())
            .unwrap();
        assert!(summary.empty_folders.is_empty());
        assert_eq!(summary.total_count, 0);
    }

    #[test]
    fn test_cancel_after_last_visit_keeps_result() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let a = mkdir(root, "A");

        let files = IgnoreSpec::default();
        let options = ScanOptions::default();
        let token = CancellationToken::new();
        // One slot: the 100% tick fills it, so the Found send for A waits
        let (tx, mut rx) = mpsc::channel(1);
        let watcher = tx.clone();

        let (result, events) = std::thread::scope(|s| {
            let worker = s.spawn(|| {
                EmptyDirScanner::new(&options, &files, &files, &token)
                    .with_events(tx, Some(1))
                    .run(root)
            });

            // A has passed its cancellation check once the slot is taken
            while watcher.capacity() > 0 {
                std::thread::yield_now();
            }
            token.cancel();
            drop(watcher);

            let mut events = Vec::new();
            while let Some(event) = rx.blocking_recv() {
                events.push(event);
            }
            (worker.join().unwrap(), events)
        });

        let summary = result.expect("walk finished before the cancel was seen");
        assert_eq!(summary.empty_folders, vec![DirectoryRef::new(&a)]);
        assert_eq!(summary.total_count, 1);
        assert!(matches!(events.as_slice(), [ScanEvent::Progress(100), ScanEvent::Found(_)]));
    }

    #[test]
    fn test_scan_streams_found_events() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "one");
        mkdir(root, "two/three");

        let files = IgnoreSpec::default();
        let options = ScanOptions::default();
        let token = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(64);
        let summary = EmptyDirScanner::new(&options, &files, &files, &token)
            .with_events(tx, Some(3))
            .run(root)
            .unwrap();

        let mut found = Vec::new();
        let mut last_percent = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                ScanEvent::Found(dir) => found.push(dir),
                ScanEvent::Progress(p) => last_percent = p,
            }
        }
        assert_eq!(found, summary.empty_folders);
        assert_eq!(last_percent, 100);
    }

    // Counter

    fn count(root: &Path, options: &ScanOptions, token: &CancellationToken) -> Result<u64, TaskError> {
        count_directories(root, options, &IgnoreSpec::default(), token)
    }

    fn depth(max_depth: Option<usize>) -> ScanOptions {
        ScanOptions {
            max_depth,
            ..Default::default()
        }
    }

    #[test]
    fn test_count_excludes_root_and_honours_depth() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "a/b/c");
        mkdir(root, "d");
        touch(root, "a/file.txt", b"x");

        let token = CancellationToken::new();
        assert_eq!(count(root, &depth(None), &token).unwrap(), 4);
        assert_eq!(count(root, &depth(Some(1)), &token).unwrap(), 2);
        assert_eq!(count(root, &depth(Some(0)), &token).unwrap(), 0);

        token.cancel();
        assert!(count(root, &depth(None), &token)
            .unwrap_err()
            .is_cancelled());
    }

    #[test]
    fn test_count_without_directories_ignores_cancel() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "only.txt", b"x");
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(count(temp.path(), &depth(None), &token).unwrap(), 0);
    }

    #[test]
    fn test_count_matches_scan_when_folders_are_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        mkdir(root, "outer/.cache/deep/deeper");
        mkdir(root, "vendor/pkg");
        mkdir(root, "plain");

        let options = ScanOptions {
            ignore_hidden_folders: true,
            ..Default::default()
        };
        let folders = IgnoreSpec::compile("vendor").unwrap();
        let token = CancellationToken::new();

        // outer, .cache, vendor and plain; nothing below a skipped folder
        let counted = count_directories(root, &options, &folders, &token).unwrap();
        assert_eq!(counted, 4);

        let summary = scan_with(root, &options, "", "vendor").unwrap();
        assert_eq!(summary.total_count as u64, counted);
        assert_eq!(found_names(&summary, root), vec!["plain"]);
    }

    #[test]
    fn test_count_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let err = count(&temp.path().join("nope"), &depth(None), &token).unwrap_err();
        assert!(matches!(err, TaskError::Filesystem { .. }));
    }

    // Deletion executor

    #[derive(Default)]
    struct RecordingRemover {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl DirectoryRemover for RecordingRemover {
        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            self.calls.lock().unwrap().push(path.to_path_buf());
            fs::remove_dir(path)
        }
    }

    fn delete_options(simulate: bool) -> DeleteOptions {
        DeleteOptions {
            ignore_zero_byte_files: false,
            inter_delete_delay: Duration::ZERO,
            simulate,
        }
    }

    #[tokio::test]
    async fn test_delete_removes_ignored_files_then_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let a = mkdir(root, "A");
        let c = mkdir(root, "C");
        let ignored = touch(root, "C/ignored.tmp", b"scratch");

        let spec = IgnoreSpec::compile("*.tmp").unwrap();
        let options = delete_options(false);
        let registry = Mutex::new(ProtectedFolderRegistry::new());
        let stop = AtomicBool::new(false);
        let folders = vec![DirectoryRef::new(&a), DirectoryRef::new(&c)];

        let summary = DeletionExecutor::new(&FsRemover, &spec, &options)
            .run(&folders, &registry, &stop, None)
            .await;

        assert_eq!(summary.deleted_count, 2);
        assert_eq!(summary.failed_count, 0);
        assert!(!summary.stopped);
        assert!(!ignored.exists());
        assert!(!a.exists());
        assert!(!c.exists());
    }

    #[tokio::test]
    async fn test_delete_never_touches_protected() {
        let temp = TempDir::new().unwrap();
        let keep = mkdir(temp.path(), "keep");
        let drop_me = mkdir(temp.path(), "drop");

        let remover = RecordingRemover::default();
        let spec = IgnoreSpec::default();
        let options = delete_options(false);
        let mut registry = ProtectedFolderRegistry::new();
        registry.add(&keep, "keep|user");
        let registry = Mutex::new(registry);
        let stop = AtomicBool::new(false);
        let outcomes = Mutex::new(Vec::new());
        let record = |p: &DeleteProgress| outcomes.lock().unwrap().push((p.index, p.outcome, p.total));

        let folders = vec![DirectoryRef::new(&keep), DirectoryRef::new(&drop_me)];
        let summary = DeletionExecutor::new(&remover, &spec, &options)
            .run(&folders, &registry, &stop, Some(&record))
            .await;

        assert_eq!(summary.deleted_count, 1);
        assert_eq!(summary.failed_count, 0);
        assert!(keep.exists());
        assert_eq!(*remover.calls.lock().unwrap(), vec![drop_me.clone()]);
        assert_eq!(
            *outcomes.lock().unwrap(),
            vec![(0, DeletionOutcome::Protected, 2), (1, DeletionOutcome::Deleted, 2)]
        );
    }

    #[tokio::test]
    async fn test_simulated_delete_leaves_disk_alone() {
        let temp = TempDir::new().unwrap();
        let a = mkdir(temp.path(), "a");
        let protected = mkdir(temp.path(), "p");
        let remover = RecordingRemover::default();
        let spec = IgnoreSpec::default();
        let options = delete_options(true);
        let mut registry = ProtectedFolderRegistry::new();
        registry.add(&protected, "p");
        let registry = Mutex::new(registry);
        let stop = AtomicBool::new(false);

        let folders = vec![DirectoryRef::new(&a), DirectoryRef::new(&protected)];
        let summary = DeletionExecutor::new(&remover, &spec, &options)
            .run(&folders, &registry, &stop, None)
            .await;

        assert_eq!(summary.deleted_count, 1);
        assert!(a.exists());
        assert!(remover.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_and_vanished_counts_as_deleted() {
        let temp = TempDir::new().unwrap();
        let busy = mkdir(temp.path(), "busy");
        touch(temp.path(), "busy/report.pdf", b"%PDF");
        let gone = temp.path().join("gone");
        let last = mkdir(temp.path(), "last");

        let spec = IgnoreSpec::compile("*.tmp").unwrap();
        let options = delete_options(false);
        let registry = Mutex::new(ProtectedFolderRegistry::new());
        let stop = AtomicBool::new(false);
        let folders = vec![
            DirectoryRef::new(&busy),
            DirectoryRef::new(&gone),
            DirectoryRef::new(&last),
        ];

        let summary = DeletionExecutor::new(&FsRemover, &spec, &options)
            .run(&folders, &registry, &stop, None)
            .await;

        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.deleted_count, 2);
        assert!(busy.join("report.pdf").exists());
        assert!(!last.exists());
    }

    #[tokio::test]
    async fn test_stop_request_keeps_finished_outcomes() {
        let temp = TempDir::new().unwrap();
        let dirs: Vec<PathBuf> = (0..4).map(|i| mkdir(temp.path(), &format!("d{}", i))).collect();

        let spec = IgnoreSpec::default();
        let options = delete_options(false);
        let registry = Mutex::new(ProtectedFolderRegistry::new());
        let stop = AtomicBool::new(false);
        let stop_after_second = |p: &DeleteProgress| {
            if p.index == 1 {
                stop.store(true, Ordering::SeqCst);
            }
        };

        let folders: Vec<DirectoryRef> = dirs.iter().map(DirectoryRef::new).collect();
        let summary = DeletionExecutor::new(&FsRemover, &spec, &options)
            .run(&folders, &registry, &stop, Some(&stop_after_second))
            .await;

        assert!(summary.stopped);
        assert_eq!(summary.deleted_count, 2);
        assert_eq!(summary.failed_count, 0);
        assert!(!dirs[0].exists());
        assert!(!dirs[1].exists());
        assert!(dirs[2].exists());
        assert!(dirs[3].exists());
    }
}
