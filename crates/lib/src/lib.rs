//! durastore-lib: durable record storage on a plain filesystem.
//!
//! Records are named by slash-separated keys and stored one file per key
//! beneath a root directory:
//! - [`atomic`]: crash-safe replacement of a file's content
//! - [`lock`]: per-record advisory locks, shared or exclusive, across processes
//! - [`RecordStore`]: save / load / exists / delete / list on top of both
//!
//! ```no_run
//! use durastore_lib::RecordStore;
//!
//! # fn main() -> Result<(), durastore_lib::StoreError> {
//! let store = RecordStore::open("/var/lib/game/records")?;
//! store.save("char/7", &serde_json::json!({ "name": "Rath", "hp": 12 }))?;
//! let hero: serde_json::Value = store.load("char/7")?;
//! assert_eq!(hero["hp"], 12);
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod codec;
pub mod config;
pub mod consts;
pub mod error;
pub mod key;
pub mod lock;
pub mod store;

pub use codec::{Codec, CodecError, JsonCodec, YamlCodec};
pub use config::{LockWait, StoreConfig, StoreOptions, default_root};
pub use error::StoreError;
pub use lock::{LockMode, LockState, RecordLock, RecordLockError};
pub use store::RecordStore;
