//! The membership index: per family head, the set of resident ids whose
//! `familyHeadId` points at it.
//!
//! This is a secondary index over `Resident::family_head_id`, stored at
//! `familyMembers:<familyHeadId>`. Every operation is a single atomic set
//! command and is idempotent, so callers may retry freely.

use std::collections::BTreeSet;

use crate::{Error, Result, keys, kv::KeyValueStore};

pub struct MembershipIndex<'a, S> {
  store: &'a S,
}

impl<'a, S: KeyValueStore> MembershipIndex<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Record `resident_id` as a member of `family_head_id`. Returns `true` if
  /// it was not already a member.
  pub async fn add(&self, family_head_id: &str, resident_id: &str) -> Result<bool> {
    self
      .store
      .sadd(&keys::family_members(family_head_id), resident_id)
      .await
      .map_err(Error::store)
  }

  /// Returns `true` if `resident_id` was a member.
  pub async fn remove(&self, family_head_id: &str, resident_id: &str) -> Result<bool> {
    self
      .store
      .srem(&keys::family_members(family_head_id), resident_id)
      .await
      .map_err(Error::store)
  }

  /// Member ids, ordered; empty if the family head has none (or does not
  /// exist).
  pub async fn members(&self, family_head_id: &str) -> Result<BTreeSet<String>> {
    self
      .store
      .smembers(&keys::family_members(family_head_id))
      .await
      .map_err(Error::store)
  }

  pub async fn is_empty(&self, family_head_id: &str) -> Result<bool> {
    let count = self
      .store
      .scard(&keys::family_members(family_head_id))
      .await
      .map_err(Error::store)?;
    Ok(count == 0)
  }

  /// Start `family_head_id` with an empty set, discarding anything left
  /// under the key.
  pub(crate) async fn reset(&self, family_head_id: &str) -> Result<()> {
    self.drop_index(family_head_id).await
  }

  /// Remove the whole set; only called when its family head is deleted.
  pub(crate) async fn drop_index(&self, family_head_id: &str) -> Result<()> {
    self
      .store
      .del(&keys::family_members(family_head_id))
      .await
      .map_err(Error::store)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::MemoryStore;

  #[tokio::test]
  async fn add_twice_keeps_one_entry() {
    let store = MemoryStore::new();
    let index = MembershipIndex::new(&store);

    assert!(index.add("F-2024001", "R-2024001").await.unwrap());
    assert!(!index.add("F-2024001", "R-2024001").await.unwrap());

    let members = index.members("F-2024001").await.unwrap();
    assert_eq!(members.into_iter().collect::<Vec<_>>(), ["R-2024001"]);
  }

  #[tokio::test]
  async fn remove_is_idempotent() {
    let store = MemoryStore::new();
    let index = MembershipIndex::new(&store);

    index.add("F-2024001", "R-2024001").await.unwrap();
    assert!(index.remove("F-2024001", "R-2024001").await.unwrap());
    assert!(!index.remove("F-2024001", "R-2024001").await.unwrap());
    assert!(index.is_empty("F-2024001").await.unwrap());
  }

  #[tokio::test]
  async fn unknown_family_head_has_no_members() {
    let store = MemoryStore::new();
    let index = MembershipIndex::new(&store);
    assert!(index.members("F-2099001").await.unwrap().is_empty());
    assert!(index.is_empty("F-2099001").await.unwrap());
  }

  #[tokio::test]
  async fn reset_clears_stale_members() {
    let store = MemoryStore::new();
    let index = MembershipIndex::new(&store);
    index.add("F-2024001", "R-2024001").await.unwrap();
    index.reset("F-2024001").await.unwrap();
    assert!(index.is_empty("F-2024001").await.unwrap());
    assert!(!store.exists("familyMembers:F-2024001").await.unwrap());
  }
}
