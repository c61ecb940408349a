//! The record store.
//!
//! # Storage Layout
//!
//! ```text
//! {root}/
//! ├── char/
//! │   ├── 7            # record "char/7", codec-encoded payload
//! │   └── 7.lock       # sidecar lock for "char/7", always empty
//! └── world            # record "world"
//! ```
//!
//! # Concurrency
//!
//! Two layers of exclusion are combined. Inside one process, each store holds
//! a reader/writer guard for the duration of every operation. Across stores
//! and processes, the per-record [`RecordLock`] is taken shared for reads and
//! exclusive for writes and deletes. Writes go through
//! [`write_atomic`](crate::atomic::write_atomic), so a reader that skips
//! locking still never sees a torn record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::atomic;
use crate::codec::{Codec, YamlCodec};
use crate::config::{LockWait, StoreConfig, StoreOptions};
use crate::consts::LOCK_SUFFIX;
use crate::error::StoreError;
use crate::key::{self, KeyPattern};
use crate::lock::{LockMode, RecordLock, RecordLockError};

/// Durable, lock-protected storage of named records under one root directory.
#[derive(Debug)]
pub struct RecordStore<C = YamlCodec> {
  root: PathBuf,
  codec: C,
  options: StoreOptions,
  guard: RwLock<()>,
  skipped: AtomicU64,
}

impl RecordStore<YamlCodec> {
  /// Open a store at `root` with the YAML codec and default options.
  pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
    Self::with_options(root, YamlCodec, StoreOptions::default())
  }
}

impl<C: Codec> RecordStore<C> {
  pub fn with_codec(root: impl Into<PathBuf>, codec: C) -> Result<Self, StoreError> {
    Self::with_options(root, codec, StoreOptions::default())
  }

  pub fn from_config(config: &StoreConfig, codec: C) -> Result<Self, StoreError> {
    Self::with_options(config.root.clone(), codec, config.options.clone())
  }

  /// Open a store, creating `root` if it does not exist.
  pub fn with_options(root: impl Into<PathBuf>, codec: C, options: StoreOptions) -> Result<Self, StoreError> {
    let root = root.into();
    fs::create_dir_all(&root).map_err(|source| StoreError::CreateRoot {
      root: root.clone(),
      source,
    })?;
    let root = dunce::canonicalize(&root).map_err(|source| StoreError::CreateRoot { root, source })?;

    info!(
      root = %root.display(),
      codec = codec.name(),
      lock_wait = ?options.lock_wait,
      "opened record store"
    );

    Ok(Self {
      root,
      codec,
      options,
      guard: RwLock::new(()),
      skipped: AtomicU64::new(0),
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn codec(&self) -> &C {
    &self.codec
  }

  pub fn options(&self) -> &StoreOptions {
    &self.options
  }

  /// Path of the record file for `key`.
  pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
    key::resolve(&self.root, key).map_err(|source| StoreError::InvalidKey {
      key: key.to_string(),
      source,
    })
  }

  /// Entries `list` has skipped because they could not be mapped back to a
  /// key, since this store was opened.
  pub fn skipped_entries(&self) -> u64 {
    self.skipped.load(Ordering::Relaxed)
  }

  /// Replace the record at `key` with `value`.
  pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
    self.save_with(key, value, |_| Ok(()))
  }

  /// [`save`](Self::save) with a hook between the temporary write and the
  /// rename that commits it.
  pub(crate) fn save_with<T, F>(&self, key: &str, value: &T, before_rename: F) -> Result<(), StoreError>
  where
    T: Serialize + ?Sized,
    F: FnOnce(&Path) -> io::Result<()>,
  {
    let path = self.path_for(key)?;
    let _guard = self.write_guard();

    self.with_lock(key, &path, LockMode::Exclusive, |_| {
      let bytes = self.codec.encode(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
      })?;

      atomic::write_atomic_with(&path, &bytes, self.options.file_mode, before_rename).map_err(|source| {
        StoreError::Write {
          key: key.to_string(),
          source,
        }
      })?;

      info!(key, bytes = bytes.len(), "saved record");
      Ok(())
    })
  }

  /// Load and decode the record at `key`.
  ///
  /// An absent record is reported as [`StoreError::NotFound`] without taking
  /// the record lock.
  pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
    let path = self.path_for(key)?;
    let _guard = self.read_guard();

    if !path.is_file() {
      debug!(key, "record not found");
      return Err(StoreError::NotFound { key: key.to_string() });
    }

    self.with_lock(key, &path, LockMode::Shared, |_| {
      let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        // Deleted between the existence check and the lock.
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
          return Err(StoreError::NotFound { key: key.to_string() });
        }
        Err(source) => {
          return Err(StoreError::Read {
            key: key.to_string(),
            source,
          });
        }
      };

      debug!(key, bytes = bytes.len(), "read record");
      self.codec.decode(&bytes).map_err(|source| StoreError::Decode {
        key: key.to_string(),
        source,
      })
    })
  }

  /// Whether a record exists at `key`.
  ///
  /// Takes no lock, so the answer can be stale by the time it is used. Use
  /// [`load`](Self::load) and check for `NotFound` when that matters. Invalid
  /// keys report `false`.
  pub fn exists(&self, key: &str) -> bool {
    match self.path_for(key) {
      Ok(path) => path.is_file(),
      Err(e) => {
        debug!(key, error = %e, "exists called with invalid key");
        false
      }
    }
  }

  /// Remove the record at `key`. Removing an absent record succeeds.
  ///
  /// The sidecar lock file is removed too, best effort.
  pub fn delete(&self, key: &str) -> Result<(), StoreError> {
    let path = self.path_for(key)?;
    let _guard = self.write_guard();

    // Locking would create the missing directories just to find nothing.
    if path.parent().is_some_and(|parent| !parent.is_dir()) {
      debug!(key, "record already absent");
      return Ok(());
    }

    self.with_lock(key, &path, LockMode::Exclusive, |lock| {
      match fs::remove_file(&path) {
        Ok(()) => info!(key, "deleted record"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => debug!(key, "record already absent"),
        Err(source) => {
          return Err(StoreError::Remove {
            key: key.to_string(),
            source,
          });
        }
      }

      if let Err(e) = lock.close_and_remove() {
        warn!(key, error = %e, "failed to remove lock file, continuing");
      }
      Ok(())
    })
  }

  /// Keys matching the glob `pattern`, sorted.
  ///
  /// See [`KeyPattern`] for the syntax. Lock files and scratch files are
  /// never listed.
  pub fn list(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
    let compiled = KeyPattern::parse(pattern).map_err(|source| StoreError::InvalidKey {
      key: pattern.to_string(),
      source,
    })?;
    let depth = compiled.depth();
    let _guard = self.read_guard();

    let walker = WalkDir::new(&self.root)
      .min_depth(1)
      .max_depth(depth)
      .follow_links(false)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !name.starts_with('.') && compiled.matches_segment(entry.depth() - 1, &name)
      });

    let mut keys = Vec::new();
    let mut skipped = 0u64;
    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          warn!(pattern, error = %e, "skipping unreadable entry while listing");
          skipped += 1;
          continue;
        }
      };

      if entry.depth() != depth || !entry.file_type().is_file() {
        continue;
      }
      if entry.file_name().to_string_lossy().ends_with(LOCK_SUFFIX) {
        continue;
      }

      match key::relativize(&self.root, entry.path()) {
        Some(key) if compiled.matches(&key) => keys.push(key),
        Some(_) => {}
        None => {
          warn!(
            pattern,
            path = %entry.path().display(),
            "skipping entry that does not map to a key"
          );
          skipped += 1;
        }
      }
    }

    keys.sort();
    if skipped > 0 {
      self.skipped.fetch_add(skipped, Ordering::Relaxed);
    }
    debug!(pattern, matched = keys.len(), skipped, "listed records");
    Ok(keys)
  }

  /// Run `f` while holding the record lock for `path`, then release it.
  ///
  /// The lock is released before returning on every path.
  fn with_lock<R>(
    &self,
    key: &str,
    path: &Path,
    mode: LockMode,
    f: impl FnOnce(&mut RecordLock) -> Result<R, StoreError>,
  ) -> Result<R, StoreError> {
    let mut lock = RecordLock::new(path);
    self.acquire(&mut lock, mode).map_err(|source| StoreError::Lock {
      key: key.to_string(),
      source,
    })?;

    let result = f(&mut lock);

    if let Err(e) = lock.close() {
      warn!(key, error = %e, "failed to release record lock");
    }
    result
  }

  fn acquire(&self, lock: &mut RecordLock, mode: LockMode) -> Result<(), RecordLockError> {
    let acquired = match (self.options.lock_wait, mode) {
      (LockWait::Block, LockMode::Exclusive) => lock.lock_exclusive().map(|()| true)?,
      (LockWait::Block, LockMode::Shared) => lock.lock_shared().map(|()| true)?,
      (LockWait::Fail, LockMode::Exclusive) => lock.try_lock_exclusive()?,
      (LockWait::Fail, LockMode::Shared) => lock.try_lock_shared()?,
    };

    if acquired {
      Ok(())
    } else {
      Err(RecordLockError::Contended {
        lock_path: lock.lock_path().to_path_buf(),
      })
    }
  }

  // The guard protects no data, so a panic elsewhere cannot leave it invalid.
  fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
    self.guard.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
    self.guard.write().unwrap_or_else(PoisonError::into_inner)
  }
}
