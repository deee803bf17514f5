//! Staging area for output files.
//!
//! Files are written into a temporary directory next to their destination
//! and moved into place only once complete. Whatever was not persisted is
//! removed when the [`ScratchSpace`] is dropped, on success and error paths
//! alike.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, trace};

pub struct ScratchSpace {
    dir: TempDir,
    staged: Vec<PathBuf>,
}

impl ScratchSpace {
    /// Create a scratch directory inside `parent`, so persisting is a rename
    /// on the same filesystem.
    pub fn new_in(parent: &Path) -> io::Result<Self> {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        let dir = tempfile::Builder::new().prefix(".danfe-").tempdir_in(parent)?;
        trace!("Scratch space at {}", dir.path().display());
        Ok(Self {
            dir,
            staged: Vec::new(),
        })
    }

    /// Scratch space for an output file, next to it.
    pub fn for_output(output: &Path) -> io::Result<Self> {
        Self::new_in(output.parent().unwrap_or_else(|| Path::new(".")))
    }

    /// Write `bytes` to a new scratch file.
    pub fn stage(&mut self, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(format!("staged-{}", self.staged.len()));
        fs::write(&path, bytes)?;
        self.staged.push(path.clone());
        Ok(path)
    }

    /// Move a staged file to its destination.
    pub fn persist(&mut self, staged: &Path, destination: &Path) -> io::Result<()> {
        fs::rename(staged, destination)?;
        self.staged.retain(|p| p != staged);
        debug!("Wrote {}", destination.display());
        Ok(())
    }

    /// Stage and persist in one step.
    pub fn write(&mut self, destination: &Path, bytes: &[u8]) -> io::Result<()> {
        let staged = self.stage(bytes)?;
        self.persist(&staged, destination)
    }

    /// Files staged but not yet persisted.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
