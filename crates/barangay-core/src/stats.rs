//! Dashboard statistics.
//!
//! Everything here is a pure function of a record snapshot (and, for ages, a
//! reference instant) except [`total_counts`], which reads the sequence
//! counters. No state is kept between calls.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::{
  Error, Result, keys,
  kv::KeyValueStore,
  record::{Record, RecordType},
};

/// Age ranges in display order. The last is open-ended.
pub const AGE_BUCKETS: [&str; 7] =
  ["0-10", "11-20", "21-30", "31-40", "41-50", "51-60", "61+"];

/// Calendar months in display order.
pub const MONTHS: [&str; 12] = [
  "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov",
  "Dec",
];

/// How many registrations the dashboard lists by default.
pub const DEFAULT_RECENT: usize = 5;

// ─── Totals ──────────────────────────────────────────────────────────────────

/// Lifetime creation counts, read from the sequence counters. Deletions never
/// lower these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
  pub total_residents:    i64,
  pub total_family_heads: i64,
}

pub async fn total_counts<S: KeyValueStore>(store: &S) -> Result<Totals> {
  Ok(Totals {
    total_residents:    read_counter(store, keys::RESIDENT_COUNTER).await?,
    total_family_heads: read_counter(store, keys::FAMILY_HEAD_COUNTER).await?,
  })
}

async fn read_counter<S: KeyValueStore>(store: &S, key: &str) -> Result<i64> {
  match store.get(key).await.map_err(Error::store)? {
    None => Ok(0),
    Some(v) => v.parse().map_err(|_| Error::Corrupt {
      key:    key.to_owned(),
      reason: format!("counter is not an integer: {v:?}"),
    }),
  }
}

// ─── Gender ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenderBucket {
  pub name:  String,
  pub value: usize,
  /// Chart colour for the bucket.
  pub color: &'static str,
}

pub fn gender_color(name: &str) -> &'static str {
  match name {
    "Male" => "#0088FE",
    "Female" => "#FF8042",
    _ => "#FFBB28",
  }
}

/// Count records per `gender`, blank genders counted as `"Unknown"`. Buckets
/// are ordered by name.
pub fn gender_distribution(records: &[Record]) -> Vec<GenderBucket> {
  let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
  for r in records {
    let gender = r.person().gender.trim();
    let gender = if gender.is_empty() { "Unknown" } else { gender };
    *counts.entry(gender).or_default() += 1;
  }
  counts
    .into_iter()
    .map(|(name, value)| GenderBucket {
      name: name.to_owned(),
      value,
      color: gender_color(name),
    })
    .collect()
}

// ─── Age ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeBucket {
  pub name:  &'static str,
  pub count: usize,
}

/// Age in whole calendar years: the difference of the years only, ignoring
/// month and day.
pub fn age_of(birth_date: NaiveDate, as_of: DateTime<Utc>) -> i32 {
  as_of.year() - birth_date.year()
}

/// The [`AGE_BUCKETS`] entry for `age`. Negative ages land in `"0-10"`.
pub fn age_bucket(age: i32) -> &'static str { AGE_BUCKETS[bucket_index(age)] }

fn bucket_index(age: i32) -> usize {
  match age {
    ..=10 => 0,
    11..=60 => ((age - 1) / 10) as usize,
    _ => AGE_BUCKETS.len() - 1,
  }
}

/// Count records per age range as of `as_of`. All ranges are present.
pub fn age_distribution(records: &[Record], as_of: DateTime<Utc>) -> Vec<AgeBucket> {
  let mut counts = [0usize; AGE_BUCKETS.len()];
  for r in records {
    counts[bucket_index(age_of(r.person().birth_date, as_of))] += 1;
  }
  AGE_BUCKETS
    .iter()
    .zip(counts)
    .map(|(&name, count)| AgeBucket { name, count })
    .collect()
}

// ─── Monthly ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
  pub name:          &'static str,
  pub new_residents: usize,
}

/// Count registrations per calendar month (UTC), across all years. All twelve
/// months are present, January first.
pub fn monthly_trend(records: &[Record]) -> Vec<MonthBucket> {
  let mut counts = [0usize; 12];
  for r in records {
    counts[r.registration_date().month0() as usize] += 1;
  }
  MONTHS
    .iter()
    .zip(counts)
    .map(|(&name, new_residents)| MonthBucket { name, new_residents })
    .collect()
}

// ─── Recent ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentRegistration {
  pub id:          String,
  pub name:        String,
  pub date:        DateTime<Utc>,
  #[serde(rename = "type")]
  pub record_type: RecordType,
}

/// The `n` most recently registered records, newest first. Ties are broken by
/// descending id.
pub fn recent_registrations(records: &[Record], n: usize) -> Vec<RecentRegistration> {
  let mut sorted: Vec<&Record> = records.iter().collect();
  sorted.sort_by(|a, b| {
    b.registration_date()
      .cmp(&a.registration_date())
      .then_with(|| b.id().cmp(a.id()))
  });
  sorted
    .into_iter()
    .take(n)
    .map(|r| RecentRegistration {
      id:          r.id().to_owned(),
      name:        r.person().full_name(),
      date:        r.registration_date(),
      record_type: r.record_type(),
    })
    .collect()
}

// ─── Composite ───────────────────────────────────────────────────────────────

/// Body of `GET /dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
  #[serde(flatten)]
  pub totals:                Totals,
  /// Residents currently stored, unlike the lifetime `totalResidents`.
  pub live_residents:        usize,
  pub live_family_heads:     usize,
  pub gender_data:           Vec<GenderBucket>,
  pub age_data:              Vec<AgeBucket>,
  pub monthly_registrations: Vec<MonthBucket>,
  pub recent_registrations:  Vec<RecentRegistration>,
}

impl DashboardStats {
  /// Build the composite from the resident snapshot. Family heads contribute
  /// only their live count.
  pub fn compute(
    totals: Totals,
    residents: &[Record],
    live_family_heads: usize,
    as_of: DateTime<Utc>,
  ) -> Self {
    Self {
      totals,
      live_residents: residents.len(),
      live_family_heads,
      gender_data: gender_distribution(residents),
      age_data: age_distribution(residents, as_of),
      monthly_registrations: monthly_trend(residents),
      recent_registrations: recent_registrations(residents, DEFAULT_RECENT),
    }
  }
}
