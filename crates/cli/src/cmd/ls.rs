//! List command implementation.

use anyhow::Result;

use durastore_lib::{Codec, RecordStore};

use crate::output::{OutputFormat, print_json, print_warning};

pub fn cmd_ls<C: Codec>(store: &RecordStore<C>, pattern: &str, output: OutputFormat) -> Result<()> {
  let keys = store.list(pattern)?;

  if output.is_json() {
    print_json(&keys)?;
  } else {
    for key in &keys {
      println!("{key}");
    }
  }

  let skipped = store.skipped_entries();
  if skipped > 0 {
    print_warning(&format!("{skipped} entries under the root could not be read as keys"));
  }
  Ok(())
}
