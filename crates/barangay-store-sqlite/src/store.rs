//! [`SqliteStore`]: the SQLite implementation of [`KeyValueStore`].

use std::{collections::BTreeSet, path::Path};

use rusqlite::{Connection, OptionalExtension as _};
use tracing::debug;

use barangay_core::kv::{FieldMap, KeyValueStore};

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A key-value store backed by a single SQLite file.
///
/// Every command runs as one closure on the connection thread, so commands
/// never interleave. Commands that write more than one row do so inside a
/// transaction.
///
/// The inner connection is reference-counted, so clones share it.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the connection thread.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── Value kinds ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
  String,
  Hash,
  Set,
}

const KIND_SQL: &str = "
SELECT CASE
  WHEN EXISTS (SELECT 1 FROM kv_strings WHERE key = ?1) THEN 1
  WHEN EXISTS (SELECT 1 FROM kv_hashes  WHERE key = ?1) THEN 2
  WHEN EXISTS (SELECT 1 FROM kv_sets    WHERE key = ?1) THEN 3
END";

fn kind_of(conn: &Connection, key: &str) -> Result<Option<Kind>> {
  let code: Option<i64> = conn.query_row(KIND_SQL, [key], |r| r.get(0))?;
  Ok(match code {
    Some(1) => Some(Kind::String),
    Some(2) => Some(Kind::Hash),
    Some(3) => Some(Kind::Set),
    _ => None,
  })
}

/// Fail with [`Error::WrongType`] unless `key` is absent or holds `want`.
fn expect_kind(conn: &Connection, key: &str, want: Kind) -> Result<()> {
  match kind_of(conn, key)? {
    Some(kind) if kind != want => Err(Error::WrongType(key.to_owned())),
    _ => Ok(()),
  }
}

fn merge_hash(conn: &Connection, key: &str, fields: &FieldMap) -> Result<()> {
  let mut stmt = conn.prepare(
    "INSERT INTO kv_hashes (key, field, value) VALUES (?1, ?2, ?3)
     ON CONFLICT (key, field) DO UPDATE SET value = excluded.value",
  )?;
  for (field, value) in fields {
    stmt.execute(rusqlite::params![key, field, value])?;
  }
  Ok(())
}

// ─── KeyValueStore impl ──────────────────────────────────────────────────────

impl KeyValueStore for SqliteStore {
  type Error = Error;

  // ── Strings ───────────────────────────────────────────────────────────────

  async fn get(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_owned();
    self
      .call(move |conn| {
        expect_kind(conn, &key, Kind::String)?;
        let value = conn
          .query_row("SELECT value FROM kv_strings WHERE key = ?1", [&key], |r| r.get(0))
          .optional()?;
        Ok(value)
      })
      .await
  }

  async fn set(&self, key: &str, value: &str) -> Result<()> {
    let key = key.to_owned();
    let value = value.to_owned();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM kv_hashes WHERE key = ?1", [&key])?;
        tx.execute("DELETE FROM kv_sets WHERE key = ?1", [&key])?;
        tx.execute(
          "INSERT INTO kv_strings (key, value) VALUES (?1, ?2)
           ON CONFLICT (key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn incr(&self, key: &str) -> Result<i64> {
    let key = key.to_owned();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        expect_kind(&tx, &key, Kind::String)?;

        let current: Option<String> = tx
          .query_row("SELECT value FROM kv_strings WHERE key = ?1", [&key], |r| r.get(0))
          .optional()?;
        let current = match current {
          None => 0,
          Some(value) => value
            .parse::<i64>()
            .map_err(|_| Error::NotAnInteger { key: key.clone(), value })?,
        };
        let next = current
          .checked_add(1)
          .ok_or_else(|| Error::Overflow(key.clone()))?;

        tx.execute(
          "INSERT INTO kv_strings (key, value) VALUES (?1, ?2)
           ON CONFLICT (key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, next.to_string()],
        )?;
        tx.commit()?;
        Ok(next)
      })
      .await
  }

  // ── Keys ──────────────────────────────────────────────────────────────────

  async fn exists(&self, key: &str) -> Result<bool> {
    let key = key.to_owned();
    self
      .call(move |conn| Ok(kind_of(conn, &key)?.is_some()))
      .await
  }

  async fn del(&self, key: &str) -> Result<bool> {
    let key = key.to_owned();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        for table in ["kv_strings", "kv_hashes", "kv_sets"] {
          removed += tx.execute(&format!("DELETE FROM {table} WHERE key = ?1"), [&key])?;
        }
        tx.commit()?;
        Ok(removed > 0)
      })
      .await
  }

  /// Uses SQLite's `GLOB`, which also accepts `[...]` character classes.
  async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
    let pattern = pattern.to_owned();
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT key FROM kv_strings WHERE key GLOB ?1
           UNION SELECT key FROM kv_hashes WHERE key GLOB ?1
           UNION SELECT key FROM kv_sets WHERE key GLOB ?1",
        )?;
        let keys = stmt
          .query_map([&pattern], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
      })
      .await
  }

  // ── Hashes ────────────────────────────────────────────────────────────────

  async fn hget_all(&self, key: &str) -> Result<FieldMap> {
    let key = key.to_owned();
    self
      .call(move |conn| {
        expect_kind(conn, &key, Kind::Hash)?;
        let mut stmt = conn.prepare("SELECT field, value FROM kv_hashes WHERE key = ?1")?;
        let fields = stmt
          .query_map([&key], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<FieldMap>>()?;
        Ok(fields)
      })
      .await
  }

  async fn hset_all(&self, key: &str, fields: &FieldMap) -> Result<()> {
    let key = key.to_owned();
    let fields = fields.clone();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        expect_kind(&tx, &key, Kind::Hash)?;
        merge_hash(&tx, &key, &fields)?;
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn hset_existing(&self, key: &str, fields: &FieldMap) -> Result<bool> {
    let key = key.to_owned();
    let fields = fields.clone();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        match kind_of(&tx, &key)? {
          None => return Ok(false),
          Some(Kind::Hash) => {}
          Some(_) => return Err(Error::WrongType(key)),
        }
        merge_hash(&tx, &key, &fields)?;
        tx.commit()?;
        Ok(true)
      })
      .await
  }

  // ── Sets ──────────────────────────────────────────────────────────────────

  async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
    let key = key.to_owned();
    let member = member.to_owned();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        expect_kind(&tx, &key, Kind::Set)?;
        let added = tx.execute(
          "INSERT OR IGNORE INTO kv_sets (key, member) VALUES (?1, ?2)",
          rusqlite::params![key, member],
        )?;
        tx.commit()?;
        Ok(added > 0)
      })
      .await
  }

  async fn srem(&self, key: &str, member: &str) -> Result<bool> {
    let key = key.to_owned();
    let member = member.to_owned();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        expect_kind(&tx, &key, Kind::Set)?;
        let removed = tx.execute(
          "DELETE FROM kv_sets WHERE key = ?1 AND member = ?2",
          rusqlite::params![key, member],
        )?;
        tx.commit()?;
        Ok(removed > 0)
      })
      .await
  }

  async fn smembers(&self, key: &str) -> Result<BTreeSet<String>> {
    let key = key.to_owned();
    self
      .call(move |conn| {
        expect_kind(conn, &key, Kind::Set)?;
        let mut stmt = conn.prepare("SELECT member FROM kv_sets WHERE key = ?1")?;
        let members = stmt
          .query_map([&key], |r| r.get(0))?
          .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(members)
      })
      .await
  }

  async fn scard(&self, key: &str) -> Result<usize> {
    let key = key.to_owned();
    self
      .call(move |conn| {
        expect_kind(conn, &key, Kind::Set)?;
        let count: i64 =
          conn.query_row("SELECT COUNT(*) FROM kv_sets WHERE key = ?1", [&key], |r| r.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
      })
      .await
  }
}
