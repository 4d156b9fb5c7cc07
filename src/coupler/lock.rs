//! The keepalive file.
//!
//! Its presence marks an output directory as owned by a running coupler.
//! Deleting it from outside asks the run to stop after the current
//! iteration.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CouplerError, Result};

#[derive(Debug)]
pub struct KeepAlive {
    path: PathBuf,
    released: bool,
}

impl KeepAlive {
    /// Creates the keepalive file at `path`, writing the current PID.
    ///
    /// Refuses if the file already exists unless `force` is set.
    pub fn acquire(path: &Path, force: bool) -> Result<Self> {
        if path.exists() {
            if !force {
                return Err(CouplerError::Locked(path.to_path_buf()));
            }
            warn!(path = %path.display(), "overriding existing keepalive file");
        }
        fs::write(path, format!("{}\n", std::process::id()))?;
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Whether the file still exists, i.e. nobody asked the run to stop.
    pub fn is_present(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file. Missing files are not an error.
    pub fn release(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "keepalive released");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "failed to remove keepalive file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_writes_pid_and_release_removes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keepalive");

        let mut lock = KeepAlive::acquire(&path, false).unwrap();
        let pid: u32 = fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_eq!(pid, std::process::id());
        assert!(lock.is_present());

        lock.release().unwrap();
        assert!(!path.exists());
        lock.release().unwrap();
    }

    #[test]
    fn existing_lock_is_refused_unless_forced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keepalive");
        fs::write(&path, "1\n").unwrap();

        assert!(matches!(
            KeepAlive::acquire(&path, false),
            Err(CouplerError::Locked(_))
        ));
        let _lock = KeepAlive::acquire(&path, true).unwrap();
    }

    #[test]
    fn drop_removes_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keepalive");
        {
            let _lock = KeepAlive::acquire(&path, false).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
