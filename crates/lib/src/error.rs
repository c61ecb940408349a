//! Errors surfaced by [`RecordStore`](crate::RecordStore).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::atomic::AtomicWriteError;
use crate::codec::CodecError;
use crate::key::KeyError;
use crate::lock::RecordLockError;

/// Failure of a store operation.
///
/// `InvalidKey` and `Encode` are deterministic input errors; retrying them
/// cannot help. `Write`, `Read` and `Lock` come from the environment and are
/// returned as-is, without any retry inside the store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("invalid key {key:?}: {source}")]
  InvalidKey {
    key: String,
    #[source]
    source: KeyError,
  },

  #[error("record {key:?} not found")]
  NotFound { key: String },

  #[error("failed to encode record {key:?}: {source}")]
  Encode {
    key: String,
    #[source]
    source: CodecError,
  },

  #[error("failed to decode record {key:?}: {source}")]
  Decode {
    key: String,
    #[source]
    source: CodecError,
  },

  #[error("failed to lock record {key:?}: {source}")]
  Lock {
    key: String,
    #[source]
    source: RecordLockError,
  },

  #[error("failed to write record {key:?}: {source}")]
  Write {
    key: String,
    #[source]
    source: AtomicWriteError,
  },

  #[error("failed to remove record {key:?}: {source}")]
  Remove {
    key: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to read record {key:?}: {source}")]
  Read {
    key: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to create store root {root}: {source}")]
  CreateRoot {
    root: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl StoreError {
  /// Whether this error means the record does not exist.
  pub fn is_not_found(&self) -> bool {
    matches!(self, StoreError::NotFound { .. })
  }

  /// Whether the operation failed because the record lock was busy.
  pub fn is_contended(&self) -> bool {
    matches!(
      self,
      StoreError::Lock {
        source: RecordLockError::Contended { .. },
        ..
      }
    )
  }
}
