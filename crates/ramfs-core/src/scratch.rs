use crate::concurrency::{track_scratch, untrack_scratch};
use crate::CoreError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

const SCRATCH_PREFIX: &str = "ramfs";

/// Working directory for built binaries, removed when dropped.
///
/// The directory is always freshly created, either in the system temp dir
/// or inside a caller-supplied parent, so removal never touches anything the
/// run did not create.
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn acquire(parent: Option<&Path>) -> Result<Self, CoreError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        track_scratch(&path);
        info!("scratch directory {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now and report failure instead of logging it.
    pub fn release(mut self) -> Result<(), CoreError> {
        match self.dir.take() {
            Some(dir) => {
                info!("removing scratch directory {}", self.path.display());
                untrack_scratch(&self.path);
                dir.close()?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            info!("removing scratch directory {}", self.path.display());
            untrack_scratch(&self.path);
            if let Err(e) = dir.close() {
                warn!("failed to remove {}: {e}", self.path.display());
            }
        }
    }
}
