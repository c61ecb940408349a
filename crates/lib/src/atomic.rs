//! Crash-safe file replacement.
//!
//! Every write goes to a temporary file in the destination directory, is
//! synced to stable storage, and is then renamed over the destination. The
//! destination therefore always holds either its previous content or the new
//! content, never a mixture.
//!
//! No locking happens here. Callers that need mutual exclusion take a
//! [`RecordLock`](crate::lock::RecordLock) first.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::TEMP_SUFFIX;

/// Errors from [`write_atomic`].
///
/// Whatever the variant, the destination path was not modified.
#[derive(Debug, Error)]
pub enum AtomicWriteError {
  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create temporary file in {dir}: {source}")]
  CreateTemp {
    dir: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write temporary file for {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to sync temporary file for {path}: {source}")]
  Sync {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to set permissions for {path}: {source}")]
  Permissions {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to replace {path}: {source}")]
  Rename {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{path} has no file name")]
  NoFileName { path: PathBuf },
}

/// Atomically replace `path` with `bytes`.
///
/// Missing parent directories are created. On unix `mode` becomes the file's
/// permission bits; on Windows it is ignored.
pub fn write_atomic(path: &Path, bytes: &[u8], mode: u32) -> Result<(), AtomicWriteError> {
  write_atomic_with(path, bytes, mode, |_| Ok(()))
}

/// Like [`write_atomic`], running `before_rename` once the temporary file is
/// complete and closed but before it replaces `path`.
///
/// An error from the hook aborts the write the same way a failed rename does.
pub(crate) fn write_atomic_with<F>(path: &Path, bytes: &[u8], mode: u32, before_rename: F) -> Result<(), AtomicWriteError>
where
  F: FnOnce(&Path) -> io::Result<()>,
{
  let file_name = path
    .file_name()
    .ok_or_else(|| AtomicWriteError::NoFileName { path: path.to_path_buf() })?;
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };

  fs::create_dir_all(dir).map_err(|source| AtomicWriteError::CreateDir {
    path: dir.to_path_buf(),
    source,
  })?;

  // Dot prefix keeps scratch files out of the store's key namespace. The name
  // is cut short so the temp name fits wherever the target name does.
  let prefix = format!(".{}.", truncate_name(&file_name.to_string_lossy(), TEMP_NAME_BYTES));
  let mut temp = tempfile::Builder::new()
    .prefix(&prefix)
    .suffix(TEMP_SUFFIX)
    .tempfile_in(dir)
    .map_err(|source| AtomicWriteError::CreateTemp {
      dir: dir.to_path_buf(),
      source,
    })?;

  debug!(path = %path.display(), temp = %temp.path().display(), bytes = bytes.len(), "writing temporary file");

  if let Err(source) = temp.write_all(bytes).and_then(|()| temp.flush()) {
    discard(temp.into_temp_path());
    return Err(AtomicWriteError::Write {
      path: path.to_path_buf(),
      source,
    });
  }

  if let Err(source) = temp.as_file().sync_all() {
    discard(temp.into_temp_path());
    return Err(AtomicWriteError::Sync {
      path: path.to_path_buf(),
      source,
    });
  }

  // Closes the handle; the path is still removed on drop until persisted.
  let temp_path = temp.into_temp_path();

  if let Err(source) = set_mode(&temp_path, mode) {
    discard(temp_path);
    return Err(AtomicWriteError::Permissions {
      path: path.to_path_buf(),
      source,
    });
  }

  if let Err(source) = before_rename(&*temp_path) {
    discard(temp_path);
    return Err(AtomicWriteError::Rename {
      path: path.to_path_buf(),
      source,
    });
  }

  // rename(2) on unix, MoveFileExW with MOVEFILE_REPLACE_EXISTING on Windows.
  if let Err(err) = temp_path.persist(path) {
    let source = err.error;
    discard(err.path);
    return Err(AtomicWriteError::Rename {
      path: path.to_path_buf(),
      source,
    });
  }

  sync_dir(dir);
  Ok(())
}

/// Bytes of the target name kept in a temporary file name.
const TEMP_NAME_BYTES: usize = 64;

fn truncate_name(name: &str, max: usize) -> &str {
  if name.len() <= max {
    return name;
  }
  let mut end = max;
  while !name.is_char_boundary(end) {
    end -= 1;
  }
  &name[..end]
}

/// Remove an abandoned temporary file, logging rather than failing.
fn discard(temp_path: tempfile::TempPath) {
  let shown = temp_path.display().to_string();
  if let Err(e) = temp_path.close() {
    warn!(temp = %shown, error = %e, "failed to remove temporary file, continuing");
  }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(windows)]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
  Ok(())
}

/// Make the rename itself durable by syncing the directory entry.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
  if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
    warn!(dir = %dir.display(), error = %e, "failed to sync directory after rename, continuing");
  }
}

#[cfg(windows)]
fn sync_dir(_dir: &Path) {}
