use std::path::{Path, PathBuf};

use crate::io::kv::FileStore;
use crate::io::seed::{FileSeed, SampleSeed, SeedError, SeedSource};
use crate::model::config::{SeedConfig, SeedKind};

/// Name of the workspace directory
pub const WORKSPACE_DIR: &str = "taskflow";
pub const CONFIG_FILE: &str = "taskflow.toml";
/// Snapshot files live here, one per key
pub const STORE_DIR: &str = "store";

/// Error type for locating and configuring a workspace
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceIoError {
    #[error("not a taskflow workspace: no taskflow/ directory found (run `tf init`)")]
    NotAWorkspace,
    #[error("a workspace already exists at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse taskflow.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit taskflow.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("seed.file must be set when seed.source = \"file\"")]
    MissingSeedFile,
    #[error(transparent)]
    Seed(#[from] SeedError),
}

/// Where a workspace's files are
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    /// Directory containing `taskflow/`
    pub root: PathBuf,
    /// The `taskflow/` directory itself
    pub dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: &Path) -> Self {
        WorkspacePaths {
            root: root.to_path_buf(),
            dir: root.join(WORKSPACE_DIR),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.dir.join(STORE_DIR)
    }

    /// The snapshot store. Recovery entries go to the workspace directory.
    pub fn open_store(&self) -> FileStore {
        FileStore::new(self.store_dir(), &self.dir)
    }

    /// The configured seed source
    pub fn open_seed(&self, config: &SeedConfig) -> Result<Box<dyn SeedSource>, WorkspaceIoError> {
        match config.source {
            SeedKind::Sample => Ok(Box::new(SampleSeed::new())),
            SeedKind::File => {
                let file = config.file.as_deref().ok_or(WorkspaceIoError::MissingSeedFile)?;
                Ok(Box::new(FileSeed::open(&self.dir.join(file))?))
            }
        }
    }
}

/// Find the workspace by walking up from `start`, looking for a
/// `taskflow/` directory with a `taskflow.toml` in it.
pub fn discover_workspace(start: &Path) -> Result<WorkspacePaths, WorkspaceIoError> {
    let mut current = start.to_path_buf();
    loop {
        let paths = WorkspacePaths::new(&current);
        if paths.dir.is_dir() && paths.config_path().exists() {
            return Ok(paths);
        }
        if !current.pop() {
            return Err(WorkspaceIoError::NotAWorkspace);
        }
    }
}

/// Create `taskflow/` under `root` with the given config text.
pub fn create_workspace(root: &Path, config_text: &str) -> Result<WorkspacePaths, WorkspaceIoError> {
    let paths = WorkspacePaths::new(root);
    if paths.config_path().exists() {
        return Err(WorkspaceIoError::AlreadyInitialized(paths.dir));
    }
    let store_dir = paths.store_dir();
    std::fs::create_dir_all(&store_dir).map_err(|source| WorkspaceIoError::WriteError {
        path: store_dir,
        source,
    })?;
    let config_path = paths.config_path();
    std::fs::write(&config_path, config_text).map_err(|source| WorkspaceIoError::WriteError {
        path: config_path,
        source,
    })?;
    Ok(paths)
}
