//! Shared fixtures for library tests.

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use durastore_lib::RecordStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
  pub name: String,
  pub hp: u32,
}

impl Character {
  pub fn new(name: &str, hp: u32) -> Self {
    Self {
      name: name.to_string(),
      hp,
    }
  }
}

/// A payload large enough that a torn or interleaved write would show up as
/// a mix of writer ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bulk {
  pub writer: usize,
  pub lines: Vec<String>,
}

impl Bulk {
  pub fn new(writer: usize) -> Self {
    Self {
      writer,
      lines: (0..2_000).map(|i| format!("writer-{writer}-line-{i}")).collect(),
    }
  }

  /// Every line was produced by `self.writer`.
  pub fn is_consistent(&self) -> bool {
    let prefix = format!("writer-{}-", self.writer);
    self.lines.len() == 2_000 && self.lines.iter().all(|line| line.starts_with(&prefix))
  }
}

pub fn temp_store() -> (TempDir, RecordStore) {
  let temp = TempDir::new().unwrap();
  let store = RecordStore::open(temp.path()).unwrap();
  (temp, store)
}
