// src/empty_dirs/controller.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::{self, JoinError};
use tokio_util::sync::CancellationToken;

use super::counter::count_directories;
use super::deleter::{DeletionExecutor, DirectoryRemover, FsRemover};
use super::error::{PatternError, RegistryError, TaskError, WorkflowError};
use super::paths::resolve_root;
use super::pattern::IgnoreSpec;
use super::protected::ProtectedFolderRegistry;
use super::scanner::EmptyDirScanner;
use super::types::{
    DeleteProgress, DeletionSummary, DirectoryRef, ScanEvent, WorkflowEvent, WorkflowPhase,
};
use crate::config::WorkflowConfig;
use crate::ops::{ActiveTask, TaskKind};

/// Bound on scanner events in flight between the worker and the forwarder.
const SCAN_EVENT_CAPACITY: usize = 256;

pub type WorkflowEvents = mpsc::UnboundedReceiver<WorkflowEvent>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Phase state plus the event sender, shared with spawned tasks.
#[derive(Clone)]
struct Publisher {
    phase: Arc<Mutex<WorkflowPhase>>,
    events: mpsc::UnboundedSender<WorkflowEvent>,
}

impl Publisher {
    fn emit(&self, event: WorkflowEvent) {
        // Nobody listening is not an error for the workflow
        let _ = self.events.send(event);
    }

    fn set_phase(&self, phase: WorkflowPhase) {
        *lock(&self.phase) = phase;
        self.emit(WorkflowEvent::PhaseChanged { phase });
    }

    fn error(&self, message: String) {
        log::warn!("workflow error: {}", message);
        self.emit(WorkflowEvent::Error { message });
    }

    fn cancelled(&self) {
        self.emit(WorkflowEvent::Cancelled);
        self.set_phase(WorkflowPhase::Init);
    }

    /// Publish the failure side of a finished background task.
    fn task_failed(&self, kind: TaskKind, err: TaskError) {
        match err {
            TaskError::Cancelled => {
                log::info!("{:?} cancelled", kind);
                self.cancelled();
            }
            other => self.error(other.to_string()),
        }
    }
}

/// Clears the flag when dropped, including when the owning future is dropped.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn flatten<T>(joined: Result<Result<T, TaskError>, JoinError>) -> Result<T, TaskError> {
    joined.unwrap_or_else(|e| Err(TaskError::Aborted(e.to_string())))
}

/// Sequences count, scan and delete over one directory tree.
///
/// Counting and scanning run on the blocking pool and report through the
/// event receiver returned by [`WorkflowController::new`]; deletion runs in the
/// caller's task. Only one phase is active at a time, and starting a phase
/// while a background task is still running returns [`WorkflowError::Busy`].
/// `start_counting` and `start_scanning` must be called inside a Tokio runtime.
pub struct WorkflowController {
    config: WorkflowConfig,
    publisher: Publisher,
    remover: Arc<dyn DirectoryRemover>,
    active: Mutex<Option<ActiveTask>>,
    empty_folders: Arc<Mutex<Vec<DirectoryRef>>>,
    directory_count: Arc<Mutex<Option<u64>>>,
    protected: Mutex<ProtectedFolderRegistry>,
    stop_delete: AtomicBool,
    deleting: AtomicBool,
}

impl WorkflowController {
    pub fn new(config: WorkflowConfig) -> (Self, WorkflowEvents) {
        Self::with_remover(config, Arc::new(FsRemover))
    }

    pub fn with_remover(
        config: WorkflowConfig,
        remover: Arc<dyn DirectoryRemover>,
    ) -> (Self, WorkflowEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = WorkflowController {
            config,
            publisher: Publisher {
                phase: Arc::new(Mutex::new(WorkflowPhase::Init)),
                events: tx,
            },
            remover,
            active: Mutex::new(None),
            empty_folders: Arc::new(Mutex::new(Vec::new())),
            directory_count: Arc::new(Mutex::new(None)),
            protected: Mutex::new(ProtectedFolderRegistry::new()),
            stop_delete: AtomicBool::new(false),
            deleting: AtomicBool::new(false),
        };
        (controller, rx)
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn phase(&self) -> WorkflowPhase {
        *lock(&self.publisher.phase)
    }

    /// Snapshot of the last completed scan's findings, in discovery order.
    pub fn empty_folders(&self) -> Vec<DirectoryRef> {
        lock(&self.empty_folders).clone()
    }

    /// Result of the last completed count, if any.
    pub fn directory_count(&self) -> Option<u64> {
        *lock(&self.directory_count)
    }

    /// Back to `Init`, dropping scan results. Protected folders are kept.
    pub fn reset(&self) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        lock(&self.empty_folders).clear();
        *lock(&self.directory_count) = None;
        self.publisher.set_phase(WorkflowPhase::Init);
        Ok(())
    }

    /// The root is resolved to its canonical absolute form on the worker; a
    /// root that cannot be resolved is published as an `Error` event.
    pub fn start_counting(&self, root: impl AsRef<Path>) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        let ignore_folders = self.compile(self.config.compile_folder_spec())?;
        lock(&self.empty_folders).clear();
        *lock(&self.directory_count) = None;
        self.publisher.set_phase(WorkflowPhase::CountingDirectories);

        let root = root.as_ref().to_path_buf();
        let options = self.config.scan_options();
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let publisher = self.publisher.clone();
        let count_slot = self.directory_count.clone();

        log::info!("counting directories under {}", root.display());
        let done = CancellationToken::new();
        let done_guard = done.clone().drop_guard();
        tokio::spawn(async move {
            let _done = done_guard;
            let started = Instant::now();
            let joined = task::spawn_blocking(move || {
                let root = resolve_root(&root)?;
                count_directories(&root, &options, &ignore_folders, &worker_token)
            })
            .await;
            match flatten(joined) {
                Ok(count) => {
                    log::info!("counted {} directories in {:?}", count, started.elapsed());
                    *lock(&count_slot) = Some(count);
                    publisher.emit(WorkflowEvent::CountingFinished { count });
                }
                Err(e) => publisher.task_failed(TaskKind::CountDirectories, e),
            }
        });

        *lock(&self.active) = Some(ActiveTask::new(TaskKind::CountDirectories, token, done));
        Ok(())
    }

    /// Found paths are always absolute, whatever form `root` is given in.
    pub fn start_scanning(&self, root: impl AsRef<Path>) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        let ignore_files = self.compile(self.config.compile_file_spec())?;
        let ignore_folders = self.compile(self.config.compile_folder_spec())?;

        lock(&self.empty_folders).clear();
        self.publisher.set_phase(WorkflowPhase::ScanningForEmptyDirs);

        let root = root.as_ref().to_path_buf();
        let options = self.config.scan_options();
        let total_dirs = self.directory_count();
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let publisher = self.publisher.clone();
        let list_slot = self.empty_folders.clone();
        let (tx, mut rx) = mpsc::channel(SCAN_EVENT_CAPACITY);

        log::info!("scanning {} for empty directories", root.display());
        let done = CancellationToken::new();
        let done_guard = done.clone().drop_guard();
        tokio::spawn(async move {
            let _done = done_guard;
            let started = Instant::now();
            let worker = task::spawn_blocking(move || {
                let root = resolve_root(&root)?;
                EmptyDirScanner::new(&options, &ignore_files, &ignore_folders, &worker_token)
                    .with_events(tx, total_dirs)
                    .run(&root)
            });

            // Ends once the scanner drops its sender
            while let Some(event) = rx.recv().await {
                match event {
                    ScanEvent::Progress(percent) => {
                        publisher.emit(WorkflowEvent::ScanProgress { percent })
                    }
                    ScanEvent::Found(dir) => {
                        publisher.emit(WorkflowEvent::EmptyDirFound { path: dir.path })
                    }
                }
            }

            match flatten(worker.await) {
                Ok(summary) => {
                    let empty_count = summary.empty_folders.len();
                    log::info!(
                        "found {} empty of {} directories in {:?}",
                        empty_count,
                        summary.total_count,
                        started.elapsed()
                    );
                    *lock(&list_slot) = summary.empty_folders;
                    publisher.emit(WorkflowEvent::ScanFinished {
                        empty_count,
                        total_count: summary.total_count,
                    });
                }
                Err(e) => publisher.task_failed(TaskKind::ScanEmptyDirs, e),
            }
        });

        *lock(&self.active) = Some(ActiveTask::new(TaskKind::ScanEmptyDirs, token, done));
        Ok(())
    }

    /// Delete everything the last scan found. Runs to completion or until
    /// [`cancel_active`](Self::cancel_active) sets the stop flag.
    pub async fn start_deleting(&self) -> Result<DeletionSummary, WorkflowError> {
        self.ensure_idle()?;
        let ignore_files = self.compile(self.config.compile_file_spec())?;
        if self.deleting.swap(true, Ordering::SeqCst) {
            return Err(WorkflowError::Busy(TaskKind::DeleteEmptyDirs));
        }
        let _deleting = FlagGuard(&self.deleting);

        // Frozen for the whole run
        let folders = self.empty_folders();
        let options = self.config.delete_options();
        self.stop_delete.store(false, Ordering::SeqCst);
        self.publisher.set_phase(WorkflowPhase::Deleting);

        log::info!(
            "deleting {} empty directories{}",
            folders.len(),
            if options.simulate { " (simulated)" } else { "" }
        );
        let publisher = self.publisher.clone();
        let report = move |progress: &DeleteProgress| {
            publisher.emit(WorkflowEvent::DeleteProgress(progress.clone()))
        };
        let executor = DeletionExecutor::new(self.remover.as_ref(), &ignore_files, &options);
        let summary = executor
            .run(&folders, &self.protected, &self.stop_delete, Some(&report))
            .await;

        log::info!(
            "deletion finished: {} deleted, {} failed",
            summary.deleted_count,
            summary.failed_count
        );
        self.publisher.emit(WorkflowEvent::DeleteFinished {
            deleted_count: summary.deleted_count,
            failed_count: summary.failed_count,
        });
        Ok(summary)
    }

    /// Signal whatever the current phase is running. Returns false when there
    /// was nothing to stop.
    pub fn cancel_active(&self) -> bool {
        match self.phase() {
            WorkflowPhase::CountingDirectories | WorkflowPhase::ScanningForEmptyDirs => {
                let active = lock(&self.active);
                match active.as_ref() {
                    Some(task) if task.is_running() => {
                        log::info!("cancelling {:?} after {:?}", task.kind, task.elapsed());
                        task.token.cancel();
                        true
                    }
                    _ => false,
                }
            }
            WorkflowPhase::Deleting => {
                if !self.deleting.load(Ordering::SeqCst) {
                    return false;
                }
                self.stop_delete.store(true, Ordering::SeqCst);
                true
            }
            WorkflowPhase::Init => false,
        }
    }

    /// Wait for the running count or scan, if any, to publish its final event.
    pub async fn wait(&self) {
        let done = lock(&self.active).as_ref().map(|task| task.done.clone());
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    pub fn protect(&self, path: impl Into<PathBuf>, key: impl Into<String>) {
        lock(&self.protected).add(path, key);
    }

    pub fn unprotect(&self, path: &Path) {
        lock(&self.protected).remove(path);
    }

    pub fn is_protected(&self, path: &Path) -> bool {
        lock(&self.protected).contains(path)
    }

    pub fn protected_key_parts(&self, path: &Path) -> Result<Vec<String>, RegistryError> {
        lock(&self.protected).key_parts(path)
    }

    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        if let Some(task) = lock(&self.active).as_ref() {
            if task.is_running() {
                return Err(WorkflowError::Busy(task.kind));
            }
        }
        if self.deleting.load(Ordering::SeqCst) {
            return Err(WorkflowError::Busy(TaskKind::DeleteEmptyDirs));
        }
        Ok(())
    }

    /// Config errors are published before any task starts.
    fn compile(&self, spec: Result<IgnoreSpec, PatternError>) -> Result<IgnoreSpec, WorkflowError> {
        spec.map_err(|e| {
            self.publisher.error(e.to_string());
            WorkflowError::Config(e)
        })
    }
}
