use anyhow::Result;

use durastore_lib::{Codec, RecordStore};

use crate::output::{OutputFormat, print_json};

/// Prints whether `key` exists and returns the answer for the exit status.
pub fn cmd_exists<C: Codec>(store: &RecordStore<C>, key: &str, output: OutputFormat) -> Result<bool> {
  let present = store.exists(key);
  if output.is_json() {
    print_json(&serde_json::json!({ "key": key, "exists": present }))?;
  } else {
    println!("{present}");
  }
  Ok(present)
}
