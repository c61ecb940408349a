//! `flock(2)` backend.

use std::fs::File;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsFd;
use std::path::Path;

use rustix::fs::{FlockOperation, flock};
use rustix::io::Errno;

use super::LockMode;

/// Waiters re-check the inode after acquiring, so the holder may unlink the
/// sidecar before releasing it.
pub(super) const REMOVE_WHILE_HELD: bool = true;

pub(super) fn configure(_options: &mut std::fs::OpenOptions) {}

pub(super) fn lock(file: &File, mode: LockMode, blocking: bool) -> io::Result<()> {
  let operation = match (mode, blocking) {
    (LockMode::Shared, true) => FlockOperation::LockShared,
    (LockMode::Exclusive, true) => FlockOperation::LockExclusive,
    (LockMode::Shared, false) => FlockOperation::NonBlockingLockShared,
    (LockMode::Exclusive, false) => FlockOperation::NonBlockingLockExclusive,
  };

  loop {
    match flock(file.as_fd(), operation) {
      Ok(()) => return Ok(()),
      // A signal interrupted the wait.
      Err(Errno::INTR) => continue,
      Err(e) => return Err(io::Error::from_raw_os_error(e.raw_os_error())),
    }
  }
}

pub(super) fn unlock(file: &File) -> io::Result<()> {
  flock(file.as_fd(), FlockOperation::Unlock).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

pub(super) fn is_contended(err: &io::Error) -> bool {
  err.kind() == io::ErrorKind::WouldBlock
}

/// Whether `file` is still the inode linked at `lock_path`.
pub(super) fn is_current(file: &File, lock_path: &Path) -> io::Result<bool> {
  let held = file.metadata()?;
  match std::fs::metadata(lock_path) {
    Ok(linked) => Ok(held.dev() == linked.dev() && held.ino() == linked.ino()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}
