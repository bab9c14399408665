// src/fscommit.rs

//! Atomic file commits.
//!
//! Every on-disk mutation in the catalogue goes through [`AtomicFile`]:
//! a temp file is opened in the destination's directory, the caller
//! writes to it, and `commit()` renames it into place. The rename is
//! same-directory, so POSIX filesystems make it atomic. If `commit()`
//! is never reached the temp file is unlinked when the guard drops.

use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Scoped write-to-temp-then-rename guard.
pub struct AtomicFile {
    dest: PathBuf,
    temp: NamedTempFile,
}

impl AtomicFile {
    /// Open a temp file beside `dest`, creating parent directories as needed.
    pub fn new(dest: impl AsRef<Path>) -> Result<Self> {
        let dest = dest.as_ref().to_path_buf();
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));

        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| Error::commit(&dest, e))?;
        }

        let temp = NamedTempFile::new_in(dir).map_err(|e| Error::commit(&dest, e))?;
        Ok(Self { dest, temp })
    }

    /// The destination this guard will commit to.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Atomically rename the temp file onto the destination.
    pub fn commit(self) -> Result<()> {
        self.temp
            .as_file()
            .sync_all()
            .map_err(|e| Error::commit(&self.dest, e))?;
        self.temp
            .persist(&self.dest)
            .map_err(|e| Error::commit(&self.dest, e.error))?;
        debug!("committed {}", self.dest.display());
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.as_file_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.as_file_mut().flush()
    }
}

/// Remove leftover temp files from commits interrupted by a crash.
///
/// Temp names start with `.tmp`; anything else in the directory is left
/// alone. Missing directories are not an error.
pub fn sweep_stale_temps(dir: impl AsRef<Path>) {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let is_temp = name.to_str().is_some_and(|n| n.starts_with(".tmp"));
        if is_temp && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!("could not remove stale temp {:?}: {}", entry.path(), e);
            } else {
                debug!("removed stale temp {:?}", entry.path());
            }
        }
    }
}
