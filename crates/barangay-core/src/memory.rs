//! [`MemoryStore`]: a process-local [`KeyValueStore`].
//!
//! Backs the test suites and the `memory` server backend. All state lives
//! behind one mutex, so every command is trivially atomic.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;

use crate::kv::{FieldMap, KeyValueStore, glob_match};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
  String(String),
  Hash(FieldMap),
  Set(BTreeSet<String>),
}

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("WRONGTYPE operation against a key holding the wrong kind of value: {0}")]
  WrongType(String),

  #[error("value is not an integer: {0}")]
  NotAnInteger(String),

  #[error("increment would overflow: {0}")]
  Overflow(String),
}

/// An in-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
  data: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
    // A panic while holding the lock cannot leave a half-applied command:
    // every mutation below is a single map operation.
    self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

fn wrong_type(key: &str) -> MemoryError { MemoryError::WrongType(key.to_owned()) }

impl KeyValueStore for MemoryStore {
  type Error = MemoryError;

  async fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
    match self.lock().get(key) {
      None => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.clone())),
      Some(_) => Err(wrong_type(key)),
    }
  }

  async fn set(&self, key: &str, value: &str) -> Result<(), MemoryError> {
    self.lock().insert(key.to_owned(), Value::String(value.to_owned()));
    Ok(())
  }

  async fn incr(&self, key: &str) -> Result<i64, MemoryError> {
    let mut data = self.lock();
    let current = match data.get(key) {
      None => 0,
      Some(Value::String(s)) => s
        .parse::<i64>()
        .map_err(|_| MemoryError::NotAnInteger(key.to_owned()))?,
      Some(_) => return Err(wrong_type(key)),
    };
    let next = current
      .checked_add(1)
      .ok_or_else(|| MemoryError::Overflow(key.to_owned()))?;
    data.insert(key.to_owned(), Value::String(next.to_string()));
    Ok(next)
  }

  async fn exists(&self, key: &str) -> Result<bool, MemoryError> {
    Ok(self.lock().contains_key(key))
  }

  async fn del(&self, key: &str) -> Result<bool, MemoryError> {
    Ok(self.lock().remove(key).is_some())
  }

  async fn keys(&self, pattern: &str) -> Result<Vec<String>, MemoryError> {
    Ok(
      self
        .lock()
        .keys()
        .filter(|k| glob_match(pattern, k))
        .cloned()
        .collect(),
    )
  }

  async fn hget_all(&self, key: &str) -> Result<FieldMap, MemoryError> {
    match self.lock().get(key) {
      None => Ok(FieldMap::new()),
      Some(Value::Hash(h)) => Ok(h.clone()),
      Some(_) => Err(wrong_type(key)),
    }
  }

  async fn hset_all(&self, key: &str, fields: &FieldMap) -> Result<(), MemoryError> {
    let mut data = self.lock();
    match data
      .entry(key.to_owned())
      .or_insert_with(|| Value::Hash(FieldMap::new()))
    {
      Value::Hash(h) => {
        h.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
      }
      _ => Err(wrong_type(key)),
    }
  }

  async fn hset_existing(&self, key: &str, fields: &FieldMap) -> Result<bool, MemoryError> {
    match self.lock().get_mut(key) {
      None => Ok(false),
      Some(Value::Hash(h)) => {
        h.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(true)
      }
      Some(_) => Err(wrong_type(key)),
    }
  }

  async fn sadd(&self, key: &str, member: &str) -> Result<bool, MemoryError> {
    let mut data = self.lock();
    match data
      .entry(key.to_owned())
      .or_insert_with(|| Value::Set(BTreeSet::new()))
    {
      Value::Set(s) => Ok(s.insert(member.to_owned())),
      _ => Err(wrong_type(key)),
    }
  }

  async fn srem(&self, key: &str, member: &str) -> Result<bool, MemoryError> {
    let mut data = self.lock();
    let (removed, now_empty) = match data.get_mut(key) {
      None => return Ok(false),
      Some(Value::Set(s)) => (s.remove(member), s.is_empty()),
      Some(_) => return Err(wrong_type(key)),
    };
    if now_empty {
      data.remove(key);
    }
    Ok(removed)
  }

  async fn smembers(&self, key: &str) -> Result<BTreeSet<String>, MemoryError> {
    match self.lock().get(key) {
      None => Ok(BTreeSet::new()),
      Some(Value::Set(s)) => Ok(s.clone()),
      Some(_) => Err(wrong_type(key)),
    }
  }

  async fn scard(&self, key: &str) -> Result<usize, MemoryError> {
    Ok(self.smembers(key).await?.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn incr_creates_and_increments() {
    let s = MemoryStore::new();
    assert_eq!(s.incr("residents:count").await.unwrap(), 1);
    assert_eq!(s.incr("residents:count").await.unwrap(), 2);
    assert_eq!(s.get("residents:count").await.unwrap().as_deref(), Some("2"));
  }

  #[tokio::test]
  async fn incr_rejects_non_integer() {
    let s = MemoryStore::new();
    s.set("n", "abc").await.unwrap();
    assert!(matches!(s.incr("n").await, Err(MemoryError::NotAnInteger(_))));
  }

  #[tokio::test]
  async fn empty_set_does_not_exist() {
    let s = MemoryStore::new();
    assert!(s.sadd("familyMembers:F-1", "R-1").await.unwrap());
    assert!(!s.sadd("familyMembers:F-1", "R-1").await.unwrap());
    assert!(s.exists("familyMembers:F-1").await.unwrap());
    assert!(s.srem("familyMembers:F-1", "R-1").await.unwrap());
    assert!(!s.exists("familyMembers:F-1").await.unwrap());
    assert_eq!(s.scard("familyMembers:F-1").await.unwrap(), 0);
  }

  #[tokio::test]
  async fn hash_commands_reject_wrong_type() {
    let s = MemoryStore::new();
    s.set("k", "v").await.unwrap();
    assert!(matches!(s.hget_all("k").await, Err(MemoryError::WrongType(_))));
    assert!(matches!(s.sadd("k", "m").await, Err(MemoryError::WrongType(_))));
  }

  #[tokio::test]
  async fn hset_all_merges_fields() {
    let s = MemoryStore::new();
    let a: FieldMap = [("a".to_owned(), "1".to_owned())].into();
    let b: FieldMap = [("b".to_owned(), "2".to_owned()), ("a".to_owned(), "3".to_owned())].into();
    s.hset_all("h", &a).await.unwrap();
    s.hset_all("h", &b).await.unwrap();
    let h = s.hget_all("h").await.unwrap();
    assert_eq!(h.get("a").map(String::as_str), Some("3"));
    assert_eq!(h.get("b").map(String::as_str), Some("2"));
  }

  #[tokio::test]
  async fn hset_existing_never_creates_a_key() {
    let s = MemoryStore::new();
    let a: FieldMap = [("address".to_owned(), "9 New Rd".to_owned())].into();
    assert!(!s.hset_existing("resident:R-2024001", &a).await.unwrap());
    assert!(!s.exists("resident:R-2024001").await.unwrap());

    s.hset_all("resident:R-2024001", &[("id".to_owned(), "R-2024001".to_owned())].into())
      .await
      .unwrap();
    assert!(s.hset_existing("resident:R-2024001", &a).await.unwrap());
    assert_eq!(s.hget_all("resident:R-2024001").await.unwrap().len(), 2);

    s.set("n", "1").await.unwrap();
    assert!(matches!(s.hset_existing("n", &a).await, Err(MemoryError::WrongType(_))));
  }

  #[tokio::test]
  async fn incr_at_max_is_an_error() {
    let s = MemoryStore::new();
    s.set("n", &i64::MAX.to_string()).await.unwrap();
    assert!(matches!(s.incr("n").await, Err(MemoryError::Overflow(_))));
    assert_eq!(s.get("n").await.unwrap(), Some(i64::MAX.to_string()));
  }
}
