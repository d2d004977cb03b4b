mod controller;
mod counter;
mod deleter;
mod error;
pub mod pattern;
mod paths;
mod protected;
mod scanner;
pub mod types;

#[cfg(test)]
mod tests;

pub use controller::{WorkflowController, WorkflowEvents};
pub use counter::count_directories;
pub use deleter::{DeletionExecutor, DirectoryRemover, FsRemover};
pub use error::{ConfigFileError, PatternError, RegistryError, TaskError, WorkflowError};
pub use pattern::IgnoreSpec;
pub use protected::ProtectedFolderRegistry;
pub use scanner::EmptyDirScanner;
pub use types::{
    DeleteOptions, DeleteProgress, DeletionOutcome, DeletionSummary, DirectoryRef, ScanEvent,
    ScanOptions, ScanSummary, WorkflowEvent, WorkflowPhase,
};
