//! Per-record advisory locking.
//!
//! A [`RecordLock`] guards one record by locking a sidecar file next to it
//! (`<record>.lock`). Locks are advisory: they only exclude other callers that
//! lock the same sidecar, typically other [`RecordStore`](crate::RecordStore)
//! instances in this or another process. Nothing stops a process from touching
//! the record file directly.
//!
//! Each `RecordLock` owns its own file handle, so two instances for the same
//! record conflict with each other even inside one process.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::LOCK_SUFFIX;

#[cfg(unix)]
#[path = "unix.rs"]
mod sys;

#[cfg(windows)]
#[path = "windows.rs"]
mod sys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
  Unlocked,
  Shared,
  Exclusive,
}

impl From<LockMode> for LockState {
  fn from(mode: LockMode) -> Self {
    match mode {
      LockMode::Shared => LockState::Shared,
      LockMode::Exclusive => LockState::Exclusive,
    }
  }
}

#[derive(Debug, Error)]
pub enum RecordLockError {
  #[error("lock {lock_path} is already held by this handle ({state:?})")]
  AlreadyHeld { lock_path: PathBuf, state: LockState },

  #[error("lock {lock_path} is held by another owner")]
  Contended { lock_path: PathBuf },

  #[error("failed to create lock directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to open lock file {lock_path}: {source}")]
  OpenFile {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to acquire lock {lock_path}: {source}")]
  LockFailed {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to release lock {lock_path}: {source}")]
  UnlockFailed {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("lock {lock_path} must be held exclusively to remove it")]
  NotExclusive { lock_path: PathBuf },

  #[error("failed to remove lock file {lock_path}: {source}")]
  RemoveFailed {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Path of the sidecar lock file for `record_path`.
pub fn lock_path_for(record_path: &Path) -> PathBuf {
  let mut name = record_path.as_os_str().to_os_string();
  name.push(LOCK_SUFFIX);
  PathBuf::from(name)
}

/// Advisory lock bound to a single record.
///
/// Construction does not touch the filesystem; the sidecar file is created on
/// the first lock attempt. Dropping the lock releases it.
#[derive(Debug)]
pub struct RecordLock {
  record_path: PathBuf,
  lock_path: PathBuf,
  file: Option<File>,
  state: LockState,
}

impl RecordLock {
  pub fn new(record_path: impl Into<PathBuf>) -> Self {
    let record_path = record_path.into();
    let lock_path = lock_path_for(&record_path);
    Self {
      record_path,
      lock_path,
      file: None,
      state: LockState::Unlocked,
    }
  }

  pub fn record_path(&self) -> &Path {
    &self.record_path
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  pub fn state(&self) -> LockState {
    self.state
  }

  pub fn is_locked(&self) -> bool {
    self.state != LockState::Unlocked
  }

  /// Block until an exclusive lock is held.
  pub fn lock_exclusive(&mut self) -> Result<(), RecordLockError> {
    self.acquire(LockMode::Exclusive, true).map(|_| ())
  }

  /// Block until a shared lock is held.
  pub fn lock_shared(&mut self) -> Result<(), RecordLockError> {
    self.acquire(LockMode::Shared, true).map(|_| ())
  }

  /// Try to take an exclusive lock without waiting.
  ///
  /// Returns `Ok(false)` if another owner holds a conflicting lock.
  pub fn try_lock_exclusive(&mut self) -> Result<bool, RecordLockError> {
    self.acquire(LockMode::Exclusive, false)
  }

  /// Try to take a shared lock without waiting.
  ///
  /// Returns `Ok(false)` if another owner holds the exclusive lock.
  pub fn try_lock_shared(&mut self) -> Result<bool, RecordLockError> {
    self.acquire(LockMode::Shared, false)
  }

  /// Release the lock. Does nothing when not locked.
  pub fn unlock(&mut self) -> Result<(), RecordLockError> {
    if self.state == LockState::Unlocked {
      return Ok(());
    }

    if let Some(file) = &self.file {
      sys::unlock(file).map_err(|source| RecordLockError::UnlockFailed {
        lock_path: self.lock_path.clone(),
        source,
      })?;
    }

    debug!(lock = %self.lock_path.display(), state = ?self.state, "released record lock");
    self.state = LockState::Unlocked;
    Ok(())
  }

  /// Release the lock and close the file handle. Safe to call repeatedly.
  ///
  /// A closed lock can be locked again; the handle is reopened on demand.
  pub fn close(&mut self) -> Result<(), RecordLockError> {
    let result = self.unlock();
    // Closing the handle drops the OS lock even if the explicit unlock failed.
    self.file = None;
    self.state = LockState::Unlocked;
    result
  }

  /// Release the exclusive lock and remove the sidecar file.
  ///
  /// The lock is always released, even when removal fails. Removal failing is
  /// harmless: the next lock attempt reuses the file.
  pub fn close_and_remove(&mut self) -> Result<(), RecordLockError> {
    if self.state != LockState::Exclusive {
      return Err(RecordLockError::NotExclusive {
        lock_path: self.lock_path.clone(),
      });
    }

    let removed = if sys::REMOVE_WHILE_HELD {
      let removed = self.remove_file();
      self.close()?;
      removed
    } else {
      self.close()?;
      self.remove_file()
    };

    if removed.is_ok() {
      debug!(lock = %self.lock_path.display(), "removed lock file");
    }
    removed
  }

  fn remove_file(&self) -> Result<(), RecordLockError> {
    match std::fs::remove_file(&self.lock_path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(RecordLockError::RemoveFailed {
        lock_path: self.lock_path.clone(),
        source,
      }),
    }
  }

  fn acquire(&mut self, mode: LockMode, blocking: bool) -> Result<bool, RecordLockError> {
    if self.state != LockState::Unlocked {
      return Err(RecordLockError::AlreadyHeld {
        lock_path: self.lock_path.clone(),
        state: self.state,
      });
    }

    loop {
      let file = match self.file.take() {
        Some(file) => file,
        None => self.open_file()?,
      };

      match sys::lock(&file, mode, blocking) {
        Ok(()) => {}
        Err(e) if !blocking && sys::is_contended(&e) => {
          debug!(lock = %self.lock_path.display(), ?mode, "record lock busy");
          self.file = Some(file);
          return Ok(false);
        }
        Err(source) => {
          self.file = Some(file);
          return Err(RecordLockError::LockFailed {
            lock_path: self.lock_path.clone(),
            source,
          });
        }
      }

      // The sidecar may have been unlinked by a delete while we waited; a
      // lock on an orphaned inode excludes nobody, so start over.
      match sys::is_current(&file, &self.lock_path) {
        Ok(true) => {
          self.file = Some(file);
          break;
        }
        Ok(false) => {
          debug!(lock = %self.lock_path.display(), "lock file replaced while waiting, retrying");
          self.release_stale(file);
        }
        Err(source) => {
          self.release_stale(file);
          return Err(RecordLockError::LockFailed {
            lock_path: self.lock_path.clone(),
            source,
          });
        }
      }
    }

    self.state = mode.into();
    debug!(lock = %self.lock_path.display(), ?mode, "acquired record lock");
    Ok(true)
  }

  fn open_file(&self) -> Result<File, RecordLockError> {
    if let Some(parent) = self.lock_path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(|source| RecordLockError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    sys::configure(&mut options);
    options.open(&self.lock_path).map_err(|source| RecordLockError::OpenFile {
      lock_path: self.lock_path.clone(),
      source,
    })
  }

  fn release_stale(&self, file: File) {
    if let Err(e) = sys::unlock(&file) {
      debug!(lock = %self.lock_path.display(), error = %e, "failed to unlock stale handle");
    }
  }
}

impl Drop for RecordLock {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      warn!(lock = %self.lock_path.display(), error = %e, "failed to release record lock on drop");
    }
  }
}
