/// Application name, used for default data directories.
pub const APP_NAME: &str = "durastore";

/// Environment variable overriding the default store root.
pub const ROOT_ENV_VAR: &str = "DURASTORE_ROOT";

/// Suffix appended to a record path to form its sidecar lock file.
pub const LOCK_SUFFIX: &str = ".lock";

/// Longest key segment in bytes. Leaves room for [`LOCK_SUFFIX`] within the
/// common 255-byte file name limit.
pub const MAX_SEGMENT_BYTES: usize = 255 - LOCK_SUFFIX.len();

/// Suffix of in-flight temporary files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Permission bits applied to record files on unix.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
