// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::empty_dirs::{ConfigFileError, DeleteOptions, IgnoreSpec, PatternError, ScanOptions};

/// Environment variable naming a JSON config file read by [`WorkflowConfig::load`].
pub const CONFIG_OVERRIDE_ENV: &str = "EMPTY_DIR_REMOVER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    // Walk
    pub max_depth: Option<usize>,       // Default: unlimited
    pub ignore_hidden_folders: bool,    // Default: true
    pub keep_system_folders: bool,      // Default: true

    // Ignore rules
    pub ignore_files: String,
    pub ignore_folders: String,
    pub pattern_delimiter: char,        // Default: '\n'
    pub ignore_zero_byte_files: bool,   // Default: true

    // Deletion
    pub inter_delete_delay_ms: u64,     // Default: 1
    pub simulate_deletion: bool,        // Default: false
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            max_depth: None,
            ignore_hidden_folders: true,
            keep_system_folders: true,
            ignore_files: "desktop.ini\nThumbs.db\n.DS_Store".into(),
            ignore_folders: "System Volume Information\n$RECYCLE.BIN".into(),
            pattern_delimiter: '\n',
            ignore_zero_byte_files: true,
            inter_delete_delay_ms: 1,
            simulate_deletion: false,
        }
    }
}

impl WorkflowConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigFileError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigFileError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigFileError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&raw)
    }

    /// Reads the file named by `EMPTY_DIR_REMOVER_CONFIG` when set, defaults otherwise.
    pub fn load() -> Result<Self, ConfigFileError> {
        match std::env::var_os(CONFIG_OVERRIDE_ENV) {
            Some(path) => Self::load_from_path(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn compile_file_spec(&self) -> Result<IgnoreSpec, PatternError> {
        IgnoreSpec::compile_with_delimiter(&self.ignore_files, self.pattern_delimiter)
    }

    pub fn compile_folder_spec(&self) -> Result<IgnoreSpec, PatternError> {
        IgnoreSpec::compile_with_delimiter(&self.ignore_folders, self.pattern_delimiter)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_depth: self.max_depth,
            ignore_zero_byte_files: self.ignore_zero_byte_files,
            ignore_hidden_folders: self.ignore_hidden_folders,
            keep_system_folders: self.keep_system_folders,
        }
    }

    pub fn delete_options(&self) -> DeleteOptions {
        DeleteOptions {
            ignore_zero_byte_files: self.ignore_zero_byte_files,
            inter_delete_delay: Duration::from_millis(self.inter_delete_delay_ms),
            simulate: self.simulate_deletion,
        }
    }
}
