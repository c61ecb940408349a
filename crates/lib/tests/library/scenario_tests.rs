//! End-to-end record lifecycle.

use durastore_lib::{JsonCodec, RecordStore, StoreError};

use super::common::{Character, temp_store};

#[test]
fn character_lifecycle() {
  let (_temp, store) = temp_store();
  let rath = Character::new("Rath", 12);

  store.save("char/7", &rath).unwrap();
  assert!(store.exists("char/7"));
  assert_eq!(store.load::<Character>("char/7").unwrap(), rath);

  store.delete("char/7").unwrap();
  assert!(!store.exists("char/7"));
  match store.load::<Character>("char/7") {
    Err(StoreError::NotFound { key }) => assert_eq!(key, "char/7"),
    other => panic!("expected NotFound, got: {other:?}"),
  }
}

#[test]
fn second_store_sees_committed_records() {
  let (temp, writer) = temp_store();
  let reader = RecordStore::open(temp.path()).unwrap();

  writer.save("world", &vec!["forest", "cave"]).unwrap();
  assert_eq!(reader.load::<Vec<String>>("world").unwrap(), vec!["forest", "cave"]);

  writer.delete("world").unwrap();
  assert!(reader.load::<Vec<String>>("world").unwrap_err().is_not_found());
}

#[test]
fn list_groups_by_prefix() {
  let (_temp, store) = temp_store();
  for key in ["a/1", "a/2", "b/1"] {
    store.save(key, &Character::new(key, 1)).unwrap();
  }

  let mut listed = store.list("a/*").unwrap();
  listed.sort();
  assert_eq!(listed, vec!["a/1", "a/2"]);

  store.delete("a/1").unwrap();
  assert_eq!(store.list("a/*").unwrap(), vec!["a/2"]);
}

#[test]
fn codecs_do_not_share_format() {
  let temp = tempfile::TempDir::new().unwrap();
  let yaml = RecordStore::open(temp.path()).unwrap();
  let json = RecordStore::with_codec(temp.path(), JsonCodec).unwrap();

  // YAML is a superset of JSON, so the YAML store can read JSON records.
  json.save("shared", &Character::new("Rath", 12)).unwrap();
  assert_eq!(yaml.load::<Character>("shared").unwrap(), Character::new("Rath", 12));

  yaml.save("shared", &Character::new("Rath", 12)).unwrap();
  let err = json.load::<Character>("shared").unwrap_err();
  assert!(matches!(err, StoreError::Decode { .. }), "got: {err}");
}
