//! Store configuration.
//!
//! The embedding process decides where records live. [`StoreConfig`] can be
//! deserialized from the host's own config file, or built from the
//! environment with [`StoreConfig::from_env`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{APP_NAME, DEFAULT_FILE_MODE, ROOT_ENV_VAR};

/// What a store operation does when a record lock is held elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockWait {
  /// Wait for the other holder to release.
  #[default]
  Block,
  /// Fail immediately with a lock error.
  Fail,
}

/// Tunables for a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreOptions {
  /// Permission bits for record files (unix only).
  pub file_mode: u32,
  pub lock_wait: LockWait,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      file_mode: DEFAULT_FILE_MODE,
      lock_wait: LockWait::Block,
    }
  }
}

/// Root directory plus options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
  pub root: PathBuf,
  #[serde(flatten)]
  pub options: StoreOptions,
}

impl StoreConfig {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      options: StoreOptions::default(),
    }
  }

  /// Config rooted at [`default_root`] with default options.
  pub fn from_env() -> Self {
    Self::new(default_root())
  }
}

/// Default store root.
///
/// `DURASTORE_ROOT` wins when set; otherwise `records` under the platform
/// data directory.
pub fn default_root() -> PathBuf {
  if let Some(path) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
    return PathBuf::from(path);
  }
  data_dir().join("records")
}

/// Returns the directory for data files for the application
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  let appdata = std::env::var_os("APPDATA").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
  appdata.join(APP_NAME)
}

/// Returns the directory for data files for the application
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  let data_home = std::env::var_os("XDG_DATA_HOME")
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

#[cfg(not(windows))]
fn home_dir() -> PathBuf {
  std::env::var_os("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."))
}
