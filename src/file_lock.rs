//! Exclusive locks on managed files
//!
//! Two layers, taken in order:
//! - a process-wide async mutex keyed by the canonical path, so every
//!   `ConfigFile` or store pointing at the same file shares one lock
//! - an advisory `flock` on a hidden sibling `.<name>.lock` file, so separate
//!   processes (the CLI next to the web layer) also take turns
//!
//! The lock file is never removed; deleting it would let a waiter and a new
//! locker hold locks on different inodes.

use crate::error::PioneerResult;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError};
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type Registry = std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

fn registry() -> &'static Registry {
    static LOCKS: OnceLock<Registry> = OnceLock::new();
    LOCKS.get_or_init(Default::default)
}

/// Held for the duration of a read-modify-write cycle
#[derive(Debug)]
pub struct FileLock {
    // Declared first so the flock is released before the in-process mutex
    _file: std::fs::File,
    _guard: OwnedMutexGuard<()>,
    path: PathBuf,
}

impl FileLock {
    /// Canonical path of the locked file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Directory holding `path`, `.` for a bare file name
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Canonical parent joined with the file name; the file itself may not exist
async fn canonical_key(path: &Path) -> PioneerResult<PathBuf> {
    let parent = parent_dir(path);
    fs::create_dir_all(&parent).await?;
    let parent = fs::canonicalize(&parent).await?;
    Ok(match path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

fn lock_file_path(key: &Path) -> PathBuf {
    let name = key
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "pioneer".to_string());
    parent_dir(key).join(format!(".{}.lock", name))
}

#[cfg(unix)]
fn flock_exclusive(file: &std::fs::File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &std::fs::File) -> io::Result<()> {
    Ok(())
}

/// Wait for exclusive access to `path`
pub async fn lock(path: &Path) -> PioneerResult<FileLock> {
    let key = canonical_key(path).await?;

    let mutex = {
        let mut locks = registry().lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.clone()).or_default().clone()
    };
    let guard = mutex.lock_owned().await;

    let lock_path = lock_file_path(&key);
    let file = tokio::task::spawn_blocking(move || -> io::Result<std::fs::File> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        flock_exclusive(&file)?;
        Ok(file)
    })
    .await
    .map_err(io::Error::other)??;

    debug!("Locked {}", key.display());
    Ok(FileLock {
        _file: file,
        _guard: guard,
        path: key,
    })
}
