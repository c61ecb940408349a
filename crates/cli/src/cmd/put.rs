//! Put command implementation.
//!
//! Reads a YAML or JSON document and saves it under a key. YAML is a superset
//! of JSON, so one parser handles both.

use std::io::Read;
use std::path::Path;

use anyhow::{Result, anyhow};
use serde_json::Value;

use durastore_lib::{Codec, RecordStore};

use crate::output::{OutputFormat, print_json, print_success};

pub fn cmd_put<C: Codec>(store: &RecordStore<C>, key: &str, file: Option<&Path>, output: OutputFormat) -> Result<()> {
  let input = match file {
    Some(path) => std::fs::read_to_string(path).map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?,
    None => {
      let mut buf = String::new();
      std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| anyhow!("failed to read document from stdin: {e}"))?;
      buf
    }
  };

  let document: Value =
    serde_yaml::from_str(&input).map_err(|e| anyhow!("input is not a valid YAML or JSON document: {e}"))?;
  store.save(key, &document)?;

  if output.is_json() {
    print_json(&serde_json::json!({ "key": key, "saved": true }))?;
  } else {
    print_success(&format!("Saved {key}"));
  }
  Ok(())
}
