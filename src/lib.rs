pub mod config;
mod empty_dirs;
mod ops;

pub use config::WorkflowConfig;
pub use empty_dirs::*;
pub use ops::{ProgressTracker, TaskKind};
