use anyhow::{Result, anyhow};
use serde_json::Value;

use durastore_lib::{Codec, RecordStore};

use crate::output::{OutputFormat, print_json};

pub fn cmd_get<C: Codec>(store: &RecordStore<C>, key: &str, output: OutputFormat) -> Result<()> {
  let record: Value = store.load(key)?;

  if output.is_json() {
    print_json(&record)?;
  } else {
    let text = serde_yaml::to_string(&record).map_err(|e| anyhow!("failed to render record as YAML: {e}"))?;
    print!("{text}");
  }
  Ok(())
}
