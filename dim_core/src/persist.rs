//! Persistence collaborators used once per calculation: the on-disk
//! calculation counter and the result-file guard.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::WrapErr;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

/// Source of the monotonically increasing calculation index.
pub trait CalculationCounter: Send {
    /// Advance the counter and return the index for this calculation.
    fn next_index(&mut self) -> eyre::Result<u64>;
}

/// Counter stored as a decimal number in a text file.
///
/// A missing file is created holding 0 and 0 is returned; otherwise the stored
/// value is incremented, rewritten, and returned.
#[derive(Debug, Clone)]
pub struct FileCounter {
    path: PathBuf,
}

impl FileCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalculationCounter for FileCounter {
    fn next_index(&mut self) -> eyre::Result<u64> {
        if !self.path.exists() {
            if let Some(dir) = self.path.parent()
                && !dir.as_os_str().is_empty()
            {
                fs::create_dir_all(dir)
                    .wrap_err_with(|| format!("creating {}", dir.display()))?;
            }
            write_atomic(&self.path, b"0")
                .wrap_err_with(|| format!("creating counter {}", self.path.display()))?;
            return Ok(0);
        }
        let text = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("reading counter {}", self.path.display()))?;
        let current: u64 = text
            .trim()
            .parse()
            .wrap_err_with(|| format!("counter {} is not a number", self.path.display()))?;
        let next = current.saturating_add(1);
        write_atomic(&self.path, next.to_string().as_bytes())
            .wrap_err_with(|| format!("writing counter {}", self.path.display()))?;
        Ok(next)
    }
}

/// In-memory counter with the same sequence as a fresh `FileCounter`.
#[derive(Debug, Default, Clone)]
pub struct MemoryCounter {
    last: Option<u64>,
}

impl CalculationCounter for MemoryCounter {
    fn next_index(&mut self) -> eyre::Result<u64> {
        let next = self.last.map_or(0, |n| n.saturating_add(1));
        self.last = Some(next);
        Ok(next)
    }
}

/// Checks that downstream result files are not held open.
pub trait ResultFileGuard: Send {
    /// `true` when a calculation may write its result.
    fn ensure_closed(&mut self) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFileGuard;

impl ResultFileGuard for NoFileGuard {
    fn ensure_closed(&mut self) -> bool {
        true
    }
}

/// Guard on an office-style lock file next to the result spreadsheet.
///
/// A stale lock is removed; if removal fails the file is considered open.
#[derive(Debug, Clone)]
pub struct LockFileGuard {
    path: PathBuf,
}

impl LockFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultFileGuard for LockFileGuard {
    fn ensure_closed(&mut self) -> bool {
        if !self.path.exists() {
            return true;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "removed stale result lock");
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "result file is locked");
                false
            }
        }
    }
}
