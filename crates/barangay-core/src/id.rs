//! Sequential, human-readable record identifiers.
//!
//! An identifier is `<prefix>-<year><seq>` where `seq` is the value returned
//! by an atomic increment of the kind's counter, zero-padded to three digits.
//! Counters are never decremented, so identifiers are never reused, even after
//! the record they named is deleted.

use chrono::{DateTime, Datelike, Utc};

use crate::{
  Error, Result, keys,
  kv::KeyValueStore,
  record::RecordType,
};

/// The kind of identifier to mint; binds a prefix to its counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
  Resident,
  FamilyHead,
}

impl IdKind {
  pub fn prefix(self) -> &'static str {
    match self {
      Self::Resident => "R",
      Self::FamilyHead => "F",
    }
  }

  pub fn counter(self) -> &'static str {
    match self {
      Self::Resident => keys::RESIDENT_COUNTER,
      Self::FamilyHead => keys::FAMILY_HEAD_COUNTER,
    }
  }
}

/// `"<prefix>-<year><seq:03>"`. Sequences above 999 simply widen.
pub fn format_id(prefix: &str, year: i32, seq: i64) -> String {
  format!("{prefix}-{year}{seq:03}")
}

/// Mints identifiers against a store's counters.
pub struct IdGenerator<'a, S> {
  store: &'a S,
}

impl<'a, S: KeyValueStore> IdGenerator<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store } }

  /// Atomically advance `kind`'s counter and format the new identifier using
  /// the year of `now`.
  pub async fn next(&self, kind: IdKind, now: DateTime<Utc>) -> Result<String> {
    let seq = self
      .store
      .incr(kind.counter())
      .await
      .map_err(Error::store)?;
    Ok(format_id(kind.prefix(), now.year(), seq))
  }
}

/// Split an identifier into its year and sequence number.
///
/// The year is always the four digits after the prefix; the sequence is the
/// remainder. Years outside 1000..=9999 are not supported.
pub fn parse_id(id: &str) -> Option<(RecordType, i32, i64)> {
  let kind = RecordType::from_id(id)?;
  let digits = &id[2..];
  if digits.len() < 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  let (year, seq) = digits.split_at(4);
  Some((kind, year.parse().ok()?, seq.parse().ok()?))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::MemoryStore;

  #[test]
  fn format_pads_to_three_digits_and_widens_past_999() {
    assert_eq!(format_id("R", 2024, 1), "R-2024001");
    assert_eq!(format_id("F", 2024, 42), "F-2024042");
    assert_eq!(format_id("R", 2024, 999), "R-2024999");
    assert_eq!(format_id("R", 2024, 1000), "R-20241000");
  }

  #[test]
  fn parse_recovers_year_and_sequence() {
    assert_eq!(parse_id("R-2024001"), Some((RecordType::Resident, 2024, 1)));
    assert_eq!(parse_id("F-20241000"), Some((RecordType::FamilyHead, 2024, 1000)));
    assert_eq!(parse_id("R-2024"), None);
    assert_eq!(parse_id("R-2024abc"), None);
    assert_eq!(parse_id("F-9999999"), Some((RecordType::FamilyHead, 9999, 999)));
  }

  #[tokio::test]
  async fn counters_are_independent_per_kind() {
    let store = MemoryStore::new();
    let ids = IdGenerator::new(&store);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

    assert_eq!(ids.next(IdKind::Resident, now).await.unwrap(), "R-2024001");
    assert_eq!(ids.next(IdKind::Resident, now).await.unwrap(), "R-2024002");
    assert_eq!(ids.next(IdKind::FamilyHead, now).await.unwrap(), "F-2024001");
  }

  #[tokio::test]
  async fn year_rolls_over_without_resetting_the_counter() {
    let store = MemoryStore::new();
    let ids = IdGenerator::new(&store);
    let dec = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
    let jan = Utc.with_ymd_and_hms(2025, 1, 1, 0, 1, 0).unwrap();

    assert_eq!(ids.next(IdKind::Resident, dec).await.unwrap(), "R-2024001");
    assert_eq!(ids.next(IdKind::Resident, jan).await.unwrap(), "R-2025002");
  }

  #[tokio::test]
  async fn concurrent_callers_never_share_a_sequence() {
    let store = MemoryStore::new();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
      let store = store.clone();
      handles.push(tokio::spawn(async move {
        IdGenerator::new(&store).next(IdKind::Resident, now).await.unwrap()
      }));
    }
    let mut ids = Vec::new();
    for h in handles {
      ids.push(h.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 32);
  }
}
