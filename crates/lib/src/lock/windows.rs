//! `LockFileEx` backend.

use std::fs::File;
use std::io;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::io::AsRawHandle;
use std::path::Path;

use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
use windows_sys::Win32::Storage::FileSystem::{
  FILE_SHARE_READ, FILE_SHARE_WRITE, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx, UnlockFileEx,
};

use super::LockMode;

/// The sidecar is opened without delete sharing, so it can only be removed
/// once every handle (ours included) is closed.
pub(super) const REMOVE_WHILE_HELD: bool = false;

pub(super) fn configure(options: &mut std::fs::OpenOptions) {
  options.share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE);
}

pub(super) fn lock(file: &File, mode: LockMode, blocking: bool) -> io::Result<()> {
  let handle = file.as_raw_handle() as HANDLE;
  let mut flags = match mode {
    LockMode::Shared => 0,
    LockMode::Exclusive => LOCKFILE_EXCLUSIVE_LOCK,
  };
  if !blocking {
    flags |= LOCKFILE_FAIL_IMMEDIATELY;
  }

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

pub(super) fn unlock(file: &File) -> io::Result<()> {
  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: same contract as LockFileEx above; unlocks the byte range it locked.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    UnlockFileEx(handle, 0, 1, 0, &mut overlapped)
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

pub(super) fn is_contended(err: &io::Error) -> bool {
  err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}

/// Without delete sharing an open sidecar cannot be unlinked, so a held handle
/// always refers to the linked file.
pub(super) fn is_current(_file: &File, _lock_path: &Path) -> io::Result<bool> {
  Ok(true)
}
