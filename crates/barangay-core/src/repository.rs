//! [`Repository`]: typed create/read/update/delete for residents and family
//! heads, keeping the membership index in step with every resident's
//! `familyHeadId`.
//!
//! The store offers no multi-key transactions. Mutations that touch a record
//! and the index therefore run in a fixed order (validate, index, record) and
//! undo already-applied index changes if a later step fails. Because every
//! index operation is idempotent, a failed undo is repaired by simply retrying
//! the original request.
//!
//! Checks that guard a write are not atomic with it. A resident created while
//! its family head is being deleted can still reference the deleted head;
//! `delete_family_head` re-reads the index afterwards and logs any such
//! member. Member address writes during a cascade never recreate a deleted
//! resident.

use std::{collections::BTreeSet, sync::Arc};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  Error, Result,
  clock::{Clock, SystemClock},
  encode, keys,
  id::{IdGenerator, IdKind},
  kv::{FieldMap, KeyValueStore},
  membership::MembershipIndex,
  record::{
    FamilyHead, FamilyHeadInput, Record, RecordType, Resident, ResidentInput,
  },
};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RepositoryOptions {
  /// When a family head's address changes, rewrite the address of every
  /// member as well.
  pub cascade_member_address: bool,
}

impl Default for RepositoryOptions {
  fn default() -> Self { Self { cascade_member_address: true } }
}

// ─── Address cascade report ──────────────────────────────────────────────────

/// What happened to one member during an address cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MemberUpdate {
  Updated,
  /// The index listed the resident but its record no longer exists.
  Missing,
  /// The resident record names a different family head; left untouched.
  Stale,
  Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberOutcome {
  pub resident_id: String,
  #[serde(flatten)]
  pub update:      MemberUpdate,
}

/// Result of [`Repository::update_family_head`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyHeadUpdate {
  #[serde(flatten)]
  pub family_head:    FamilyHead,
  /// One entry per member when the address cascaded; empty otherwise.
  pub member_updates: Vec<MemberOutcome>,
}

impl FamilyHeadUpdate {
  pub fn failures(&self) -> impl Iterator<Item = &MemberOutcome> {
    self
      .member_updates
      .iter()
      .filter(|o| !matches!(o.update, MemberUpdate::Updated))
  }
}

/// An index change already applied during an update, recorded so it can be
/// undone.
enum Applied {
  Added(String),
  Removed(String),
}

// ─── Repository ──────────────────────────────────────────────────────────────

pub struct Repository<S> {
  store:   Arc<S>,
  clock:   Arc<dyn Clock>,
  options: RepositoryOptions,
}

impl<S> Clone for Repository<S> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      clock:   Arc::clone(&self.clock),
      options: self.options,
    }
  }
}

impl<S: KeyValueStore> Repository<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      clock: Arc::new(SystemClock),
      options: RepositoryOptions::default(),
    }
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn with_options(mut self, options: RepositoryOptions) -> Self {
    self.options = options;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn clock(&self) -> &dyn Clock { self.clock.as_ref() }

  pub fn membership(&self) -> MembershipIndex<'_, S> {
    MembershipIndex::new(self.store.as_ref())
  }

  fn ids(&self) -> IdGenerator<'_, S> { IdGenerator::new(self.store.as_ref()) }

  // ── Create ────────────────────────────────────────────────────────────

  /// Validate, mint an id, persist, then index the new resident under its
  /// family head.
  ///
  /// A `familyHeadId` naming no existing family head is a
  /// [`Error::Conflict`]; nothing is written and no id is consumed.
  pub async fn create_resident(&self, input: ResidentInput) -> Result<Resident> {
    let valid = input.validate()?;
    if let Some(fh) = &valid.family_head_id {
      self.require_family_head(fh).await?;
    }

    let now = self.clock.now();
    let resident = Resident {
      id:                self.ids().next(IdKind::Resident, now).await?,
      person:            valid.person,
      family_head_id:    valid.family_head_id,
      registration_date: now,
      record_type:       RecordType::Resident,
    };
    self.put_resident(&resident).await?;

    if let Some(fh) = &resident.family_head_id
      && let Err(e) = self.membership().add(fh, &resident.id).await
    {
      warn!(id = %resident.id, family_head = %fh, error = %e,
        "indexing new resident failed; removing record");
      if let Err(undo) = self.store.del(&keys::resident(&resident.id)).await {
        warn!(id = %resident.id, error = %undo, "could not remove unindexed resident");
      }
      return Err(e);
    }

    debug!(id = %resident.id, "created resident");
    Ok(resident)
  }

  /// Validate, mint an id, persist, and start an empty membership set.
  pub async fn create_family_head(&self, input: FamilyHeadInput) -> Result<FamilyHead> {
    let person = input.validate()?;

    let now = self.clock.now();
    let family_head = FamilyHead {
      id: self.ids().next(IdKind::FamilyHead, now).await?,
      person,
      registration_date: now,
      record_type: RecordType::FamilyHead,
    };
    self.put_family_head(&family_head).await?;
    self.membership().reset(&family_head.id).await?;

    debug!(id = %family_head.id, "created family head");
    Ok(family_head)
  }

  // ── Read ──────────────────────────────────────────────────────────────

  /// Fetch a record of either type, dispatching on the id prefix.
  pub async fn get(&self, id: &str) -> Result<Record> {
    match RecordType::from_id(id) {
      Some(RecordType::Resident) => self.get_resident(id).await.map(Record::from),
      Some(RecordType::FamilyHead) => self.get_family_head(id).await.map(Record::from),
      None => Err(Error::UnknownId(id.to_owned())),
    }
  }

  pub async fn get_resident(&self, id: &str) -> Result<Resident> {
    let key = keys::resident(id);
    let fields = self.hash(&key).await?;
    if fields.is_empty() {
      return Err(Error::not_found(RecordType::Resident, id));
    }
    encode::decode_resident(&key, &fields)
  }

  pub async fn get_family_head(&self, id: &str) -> Result<FamilyHead> {
    let key = keys::family_head(id);
    let fields = self.hash(&key).await?;
    if fields.is_empty() {
      return Err(Error::not_found(RecordType::FamilyHead, id));
    }
    encode::decode_family_head(&key, &fields)
  }

  /// Every resident, in store enumeration order.
  pub async fn list_residents(&self) -> Result<Vec<Resident>> {
    let mut out = Vec::new();
    for (key, fields) in self.scan(keys::RESIDENT_PATTERN).await? {
      out.push(encode::decode_resident(&key, &fields)?);
    }
    Ok(out)
  }

  /// Every family head, in store enumeration order.
  pub async fn list_family_heads(&self) -> Result<Vec<FamilyHead>> {
    let mut out = Vec::new();
    for (key, fields) in self.scan(keys::FAMILY_HEAD_PATTERN).await? {
      out.push(encode::decode_family_head(&key, &fields)?);
    }
    Ok(out)
  }

  /// Residents and family heads together, residents first.
  pub async fn list_all(&self) -> Result<Vec<Record>> {
    let mut records: Vec<Record> =
      self.list_residents().await?.into_iter().map(Record::from).collect();
    records.extend(self.list_family_heads().await?.into_iter().map(Record::from));
    Ok(records)
  }

  /// The resident records indexed under `family_head_id`, ordered by id.
  ///
  /// Index entries whose resident no longer exists are skipped.
  pub async fn family_members(&self, family_head_id: &str) -> Result<Vec<Resident>> {
    self.get_family_head(family_head_id).await?;

    let mut members = Vec::new();
    for resident_id in self.membership().members(family_head_id).await? {
      match self.get_resident(&resident_id).await {
        Ok(r) => members.push(r),
        Err(Error::NotFound { .. }) => {
          warn!(family_head = %family_head_id, resident = %resident_id,
            "membership index lists a missing resident");
        }
        Err(e) => return Err(e),
      }
    }
    Ok(members)
  }

  // ── Update ────────────────────────────────────────────────────────────

  /// Replace a resident's mutable attributes.
  ///
  /// `id`, `type` and `registrationDate` are carried over from the stored
  /// record. A changed `familyHeadId` moves the resident between membership
  /// sets; if any step fails, index changes already made are undone and the
  /// record is left as it was.
  pub async fn update_resident(&self, id: &str, input: ResidentInput) -> Result<Resident> {
    let valid = input.validate()?;
    let current = self.get_resident(id).await?;

    if let Some(fh) = &valid.family_head_id {
      self.require_family_head(fh).await?;
    }

    let old_head = current.family_head_id.as_deref();
    let new_head = valid.family_head_id.as_deref();
    let moved = old_head != new_head;
    let mut applied = Vec::new();

    if let Some(fh) = new_head {
      // Also re-asserts an unchanged membership, repairing a lost entry.
      self.membership().add(fh, id).await?;
      if moved {
        applied.push(Applied::Added(fh.to_owned()));
      }
    }

    if moved
      && let Some(fh) = old_head
    {
      if let Err(e) = self.membership().remove(fh, id).await {
        self.undo(id, applied).await;
        return Err(e);
      }
      applied.push(Applied::Removed(fh.to_owned()));
    }

    let updated = Resident {
      id:                current.id,
      person:            valid.person,
      family_head_id:    valid.family_head_id,
      registration_date: current.registration_date,
      record_type:       RecordType::Resident,
    };
    if let Err(e) = self.put_resident(&updated).await {
      self.undo(id, applied).await;
      return Err(e);
    }

    debug!(id = %updated.id, moved, "updated resident");
    Ok(updated)
  }

  /// Replace a family head's mutable attributes.
  ///
  /// If the address changed and address cascade is enabled, each member's
  /// `address` is rewritten and reported individually in
  /// [`FamilyHeadUpdate::member_updates`].
  pub async fn update_family_head(
    &self,
    id: &str,
    input: FamilyHeadInput,
  ) -> Result<FamilyHeadUpdate> {
    let person = input.validate()?;
    let current = self.get_family_head(id).await?;
    let address_changed = current.person.address != person.address;

    // Read before any write; a failed index read leaves the head untouched.
    let members = if address_changed && self.options.cascade_member_address {
      self.membership().members(id).await?
    } else {
      BTreeSet::new()
    };

    let family_head = FamilyHead {
      id: current.id,
      person,
      registration_date: current.registration_date,
      record_type: RecordType::FamilyHead,
    };
    self.put_family_head(&family_head).await?;

    let member_updates = self.cascade_address(&family_head, members).await;

    let update = FamilyHeadUpdate { family_head, member_updates };
    let failed = update.failures().count();
    if failed > 0 {
      warn!(id = %update.family_head.id, failed, "address cascade incomplete");
    }
    debug!(id = %update.family_head.id, address_changed, "updated family head");
    Ok(update)
  }

  async fn cascade_address(
    &self,
    head: &FamilyHead,
    members: BTreeSet<String>,
  ) -> Vec<MemberOutcome> {
    let address: FieldMap =
      [("address".to_owned(), head.person.address.clone())].into();

    let mut outcomes = Vec::new();
    for resident_id in members {
      let update = match self.get_resident(&resident_id).await {
        Err(Error::NotFound { .. }) => MemberUpdate::Missing,
        Err(e) => MemberUpdate::Failed { error: e.to_string() },
        Ok(r) if r.family_head_id.as_deref() != Some(head.id.as_str()) => MemberUpdate::Stale,
        Ok(_) => match self.store.hset_existing(&keys::resident(&resident_id), &address).await {
          Ok(true) => MemberUpdate::Updated,
          // Deleted since the read above.
          Ok(false) => MemberUpdate::Missing,
          Err(e) => MemberUpdate::Failed { error: e.to_string() },
        },
      };
      if update != MemberUpdate::Updated {
        warn!(family_head = %head.id, resident = %resident_id, ?update,
          "member address not cascaded");
      }
      outcomes.push(MemberOutcome { resident_id, update });
    }
    outcomes
  }

  // ── Delete ────────────────────────────────────────────────────────────

  /// Remove a resident and its membership entry. Returns the removed record.
  pub async fn delete_resident(&self, id: &str) -> Result<Resident> {
    let resident = self.get_resident(id).await?;

    if let Some(fh) = &resident.family_head_id {
      self.membership().remove(fh, id).await?;
    }

    if let Err(e) = self.store.del(&keys::resident(id)).await {
      let e = Error::store(e);
      if let Some(fh) = &resident.family_head_id {
        self.undo(id, vec![Applied::Removed(fh.clone())]).await;
      }
      return Err(e);
    }

    debug!(id, "deleted resident");
    Ok(resident)
  }

  /// Remove a family head that has no members, along with its (empty)
  /// membership set.
  pub async fn delete_family_head(&self, id: &str) -> Result<FamilyHead> {
    let family_head = self.get_family_head(id).await?;

    if !self.membership().is_empty(id).await? {
      return Err(Error::Conflict(
        "Cannot delete family head with existing members. Please reassign or delete members first."
          .to_owned(),
      ));
    }

    self
      .store
      .del(&keys::family_head(id))
      .await
      .map_err(Error::store)?;
    self.membership().drop_index(id).await?;

    // A resident created between the emptiness check and the delete.
    let late = self.membership().members(id).await?;
    if !late.is_empty() {
      warn!(id, ?late, "members were indexed under a family head while it was deleted");
    }

    debug!(id, "deleted family head");
    Ok(family_head)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn require_family_head(&self, id: &str) -> Result<()> {
    let exists = self
      .store
      .exists(&keys::family_head(id))
      .await
      .map_err(Error::store)?;
    if exists {
      Ok(())
    } else {
      Err(Error::Conflict(format!("Family head {id} does not exist")))
    }
  }

  async fn hash(&self, key: &str) -> Result<FieldMap> {
    self.store.hget_all(key).await.map_err(Error::store)
  }

  async fn put_resident(&self, r: &Resident) -> Result<()> {
    self
      .store
      .hset_all(&keys::resident(&r.id), &encode::encode_resident(r))
      .await
      .map_err(Error::store)
  }

  async fn put_family_head(&self, f: &FamilyHead) -> Result<()> {
    self
      .store
      .hset_all(&keys::family_head(&f.id), &encode::encode_family_head(f))
      .await
      .map_err(Error::store)
  }

  /// Every non-empty hash whose key matches `pattern`.
  async fn scan(&self, pattern: &str) -> Result<Vec<(String, FieldMap)>> {
    let keys = self.store.keys(pattern).await.map_err(Error::store)?;
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
      let fields = self.hash(&key).await?;
      // Deleted between enumeration and read.
      if !fields.is_empty() {
        out.push((key, fields));
      }
    }
    Ok(out)
  }

  /// Reverse index changes in the opposite order they were applied.
  async fn undo(&self, resident_id: &str, applied: Vec<Applied>) {
    for change in applied.into_iter().rev() {
      let (fh, result) = match &change {
        Applied::Added(fh) => (fh, self.membership().remove(fh, resident_id).await.map(drop)),
        Applied::Removed(fh) => (fh, self.membership().add(fh, resident_id).await.map(drop)),
      };
      if let Err(e) = result {
        warn!(resident = %resident_id, family_head = %fh, error = %e,
          "could not undo membership change; retry the request to repair");
      }
    }
  }
}
