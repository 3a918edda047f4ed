//! The `KeyValueStore` trait: the Redis-shaped command subset the records
//! service is built on.
//!
//! The trait is implemented by storage backends ([`crate::MemoryStore`],
//! `barangay-store-sqlite`). Everything above it (repository, membership
//! index, aggregation) depends on this abstraction only.
//!
//! Semantics follow Redis: a key holds exactly one of a string, a hash or a
//! set; reading a missing hash or set yields an empty value; a set with no
//! members does not exist.

use std::{
  collections::{BTreeMap, BTreeSet},
  future::Future,
};

/// Field/value pairs of a stored hash.
pub type FieldMap = BTreeMap<String, String>;

/// Abstraction over a schemaless key-value store.
///
/// Each method is atomic with respect to the single key it touches. No method
/// spans keys transactionally.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait KeyValueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Strings ───────────────────────────────────────────────────────────

  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn set<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Atomically increment the integer at `key` (created at 0 if missing) and
  /// return the new value. Fails if the stored value is not an integer.
  fn incr<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  // ── Keys ──────────────────────────────────────────────────────────────

  fn exists<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Remove `key` whatever its type. Returns `true` if anything was removed.
  fn del<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Every key matching a glob `pattern` (`*` and `?` wildcards), in no
  /// particular order.
  fn keys<'a>(
    &'a self,
    pattern: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  // ── Hashes ────────────────────────────────────────────────────────────

  /// All fields of the hash at `key`; empty if the key does not exist.
  fn hget_all<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<FieldMap, Self::Error>> + Send + 'a;

  /// Merge `fields` into the hash at `key` in one atomic write.
  fn hset_all<'a>(
    &'a self,
    key: &'a str,
    fields: &'a FieldMap,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Like [`hset_all`](Self::hset_all), but only if `key` already holds a
  /// hash. Returns `false`, writing nothing, if the key does not exist.
  fn hset_existing<'a>(
    &'a self,
    key: &'a str,
    fields: &'a FieldMap,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Sets ──────────────────────────────────────────────────────────────

  /// Returns `true` if `member` was not already present.
  fn sadd<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Returns `true` if `member` was present.
  fn srem<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn smembers<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<BTreeSet<String>, Self::Error>> + Send + 'a;

  fn scard<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;
}

/// Match `key` against a glob `pattern` where `*` matches any run of
/// characters and `?` matches exactly one.
pub fn glob_match(pattern: &str, key: &str) -> bool {
  let p: Vec<char> = pattern.chars().collect();
  let k: Vec<char> = key.chars().collect();

  let (mut pi, mut ki) = (0, 0);
  // Position of the last `*` seen and the key index it was tried against.
  let mut star: Option<(usize, usize)> = None;

  while ki < k.len() {
    match p.get(pi) {
      Some('*') => {
        star = Some((pi, ki));
        pi += 1;
      }
      Some(&c) if c == '?' || c == k[ki] => {
        pi += 1;
        ki += 1;
      }
      _ => match star {
        Some((sp, sk)) => {
          pi = sp + 1;
          ki = sk + 1;
          star = Some((sp, sk + 1));
        }
        None => return false,
      },
    }
  }

  p[pi..].iter().all(|&c| c == '*')
}
