use anyhow::Result;

use durastore_lib::{Codec, RecordStore};

use crate::output::{OutputFormat, print_json, print_success};

pub fn cmd_rm<C: Codec>(store: &RecordStore<C>, key: &str, output: OutputFormat) -> Result<()> {
  store.delete(key)?;

  if output.is_json() {
    print_json(&serde_json::json!({ "key": key, "deleted": true }))?;
  } else {
    print_success(&format!("Deleted {key}"));
  }
  Ok(())
}
