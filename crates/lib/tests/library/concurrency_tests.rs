//! Concurrent writers and readers.
//!
//! Every thread opens its own store, so the stores only coordinate through
//! the on-disk record locks, the same way separate processes do.

use std::sync::{Arc, Barrier};
use std::thread;

use durastore_lib::{LockWait, RecordLock, RecordStore, StoreOptions, YamlCodec};

use super::common::{Bulk, Character, temp_store};

#[test]
fn concurrent_writers_leave_one_intact_value() {
  let (temp, _store) = temp_store();
  let writers = 8;
  let barrier = Arc::new(Barrier::new(writers));

  let handles: Vec<_> = (0..writers)
    .map(|writer| {
      let root = temp.path().to_path_buf();
      let barrier = Arc::clone(&barrier);
      thread::spawn(move || {
        let store = RecordStore::open(root).unwrap();
        barrier.wait();
        for _ in 0..5 {
          store.save("contested", &Bulk::new(writer)).unwrap();
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  let store = RecordStore::open(temp.path()).unwrap();
  let survivor: Bulk = store.load("contested").unwrap();
  assert!(survivor.writer < writers);
  assert!(survivor.is_consistent(), "record mixes writers");
}

#[test]
fn readers_never_observe_torn_records() {
  let (temp, store) = temp_store();
  store.save("contested", &Bulk::new(0)).unwrap();

  let writers: Vec<_> = (1..=4)
    .map(|writer| {
      let root = temp.path().to_path_buf();
      thread::spawn(move || {
        let store = RecordStore::open(root).unwrap();
        for _ in 0..10 {
          store.save("contested", &Bulk::new(writer)).unwrap();
        }
      })
    })
    .collect();

  let readers: Vec<_> = (0..4)
    .map(|_| {
      let root = temp.path().to_path_buf();
      thread::spawn(move || {
        let store = RecordStore::open(root).unwrap();
        for _ in 0..20 {
          let seen: Bulk = store.load("contested").unwrap();
          assert!(seen.is_consistent(), "reader saw a torn record");
        }
      })
    })
    .collect();

  for handle in writers.into_iter().chain(readers) {
    handle.join().unwrap();
  }
}

#[test]
fn one_store_shared_across_threads() {
  let (_temp, store) = temp_store();
  let store = Arc::new(store);

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let store = Arc::clone(&store);
      thread::spawn(move || {
        let key = format!("char/{i}");
        let value = Character::new(&key, i);
        store.save(&key, &value).unwrap();
        assert_eq!(store.load::<Character>(&key).unwrap(), value);
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(store.list("char/*").unwrap().len(), 8);
}

#[test]
fn shared_locks_are_held_simultaneously() {
  let (_temp, store) = temp_store();
  store.save("char/7", &Character::new("Rath", 12)).unwrap();
  let record = store.path_for("char/7").unwrap();

  let readers = 6;
  let acquired = Arc::new(Barrier::new(readers));
  let handles: Vec<_> = (0..readers)
    .map(|_| {
      let record = record.clone();
      let acquired = Arc::clone(&acquired);
      thread::spawn(move || {
        let mut lock = RecordLock::new(record);
        assert!(lock.try_lock_shared().unwrap());
        // Every reader holds its shared lock at this point.
        acquired.wait();
        lock.unlock().unwrap();
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }
}

#[test]
fn loads_proceed_while_another_reader_holds_the_lock() {
  let (temp, store) = temp_store();
  store.save("char/7", &Character::new("Rath", 12)).unwrap();

  let mut outside_reader = RecordLock::new(store.path_for("char/7").unwrap());
  outside_reader.lock_shared().unwrap();

  let options = StoreOptions {
    lock_wait: LockWait::Fail,
    ..StoreOptions::default()
  };
  let handles: Vec<_> = (0..4)
    .map(|_| {
      let root = temp.path().to_path_buf();
      let options = options.clone();
      thread::spawn(move || {
        let store = RecordStore::with_options(root, YamlCodec, options).unwrap();
        for _ in 0..10 {
          let loaded: Character = store.load("char/7").unwrap();
          assert_eq!(loaded.name, "Rath");
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }
  outside_reader.unlock().unwrap();
}

#[test]
fn delete_waits_for_readers_then_wins() {
  let (temp, store) = temp_store();
  store.save("char/7", &Character::new("Rath", 12)).unwrap();

  let mut reader = RecordLock::new(store.path_for("char/7").unwrap());
  reader.lock_shared().unwrap();

  let root = temp.path().to_path_buf();
  let deleter = thread::spawn(move || {
    let store = RecordStore::open(root).unwrap();
    store.delete("char/7").unwrap();
  });

  // The reader still sees the record until it lets go.
  thread::sleep(std::time::Duration::from_millis(100));
  assert!(store.exists("char/7"));

  reader.unlock().unwrap();
  deleter.join().unwrap();

  assert!(!store.exists("char/7"));
  assert!(store.load::<Character>("char/7").unwrap_err().is_not_found());
}
