//! Record types: residents, family heads, and the input bodies that create
//! and update them.
//!
//! Stored records are fully typed. Inputs are deliberately loose (every field
//! optional) so that validation can report all missing fields at once rather
//! than failing on the first.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  error::FieldError,
};

// ─── Record type ─────────────────────────────────────────────────────────────

/// The `type` discriminant carried by every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
  #[serde(rename = "Resident")]
  Resident,
  #[serde(rename = "Family Head")]
  FamilyHead,
}

impl RecordType {
  /// The wire and storage form, e.g. `"Family Head"`.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Resident => "Resident",
      Self::FamilyHead => "Family Head",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "Resident" => Some(Self::Resident),
      "Family Head" => Some(Self::FamilyHead),
      _ => None,
    }
  }

  /// Infer the record type from an identifier prefix (`R-` / `F-`).
  pub fn from_id(id: &str) -> Option<Self> {
    if id.starts_with("R-") {
      Some(Self::Resident)
    } else if id.starts_with("F-") {
      Some(Self::FamilyHead)
    } else {
      None
    }
  }
}

impl fmt::Display for RecordType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Resident => "resident",
      Self::FamilyHead => "family head",
    })
  }
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// The attributes shared by residents and family heads; the only fields a
/// caller may change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
  pub first_name:     String,
  pub last_name:      String,
  pub gender:         String,
  pub birth_date:     NaiveDate,
  pub address:        String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub contact_number: Option<String>,
}

impl Person {
  /// `"<first> <last>"`, as shown on the dashboard.
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

// ─── Stored records ──────────────────────────────────────────────────────────

/// A registered resident, optionally grouped under a family head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
  /// `R-<year><seq>`; assigned once, never reused.
  pub id:                String,
  #[serde(flatten)]
  pub person:            Person,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub family_head_id:    Option<String>,
  /// Server-assigned; never changes after creation.
  pub registration_date: DateTime<Utc>,
  #[serde(rename = "type")]
  pub record_type:       RecordType,
}

/// A household representative owning a membership set of residents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyHead {
  /// `F-<year><seq>`; assigned once, never reused.
  pub id:                String,
  #[serde(flatten)]
  pub person:            Person,
  pub registration_date: DateTime<Utc>,
  #[serde(rename = "type")]
  pub record_type:       RecordType,
}

/// Either kind of record; the unit the aggregation engine scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
  Resident(Resident),
  FamilyHead(FamilyHead),
}

impl Record {
  pub fn id(&self) -> &str {
    match self {
      Self::Resident(r) => &r.id,
      Self::FamilyHead(f) => &f.id,
    }
  }

  pub fn person(&self) -> &Person {
    match self {
      Self::Resident(r) => &r.person,
      Self::FamilyHead(f) => &f.person,
    }
  }

  pub fn registration_date(&self) -> DateTime<Utc> {
    match self {
      Self::Resident(r) => r.registration_date,
      Self::FamilyHead(f) => f.registration_date,
    }
  }

  pub fn record_type(&self) -> RecordType {
    match self {
      Self::Resident(_) => RecordType::Resident,
      Self::FamilyHead(_) => RecordType::FamilyHead,
    }
  }
}

impl From<Resident> for Record {
  fn from(r: Resident) -> Self { Self::Resident(r) }
}

impl From<FamilyHead> for Record {
  fn from(f: FamilyHead) -> Self { Self::FamilyHead(f) }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Fields that belong to a stored record but are never taken from input.
/// Clients may echo them back on update; they are ignored.
const IMMUTABLE_FIELDS: [&str; 3] = ["id", "type", "registrationDate"];

/// The mutable person attributes as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonInput {
  pub first_name:     Option<String>,
  pub last_name:      Option<String>,
  pub gender:         Option<String>,
  /// `YYYY-MM-DD` (or `YYYY/MM/DD`).
  pub birth_date:     Option<String>,
  pub address:        Option<String>,
  pub contact_number: Option<String>,
}

/// Body of `POST /residents` and `PUT /residents/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentInput {
  #[serde(flatten)]
  pub person:         PersonInput,
  /// Empty string and absence both mean "no family head".
  pub family_head_id: Option<String>,
  /// Anything else the client sent; rejected during validation unless it is
  /// one of the immutable record fields.
  #[serde(flatten)]
  pub extra:          BTreeMap<String, serde_json::Value>,
}

/// Body of `POST /familyHeads` and `PUT /familyHeads/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyHeadInput {
  #[serde(flatten)]
  pub person: PersonInput,
  #[serde(flatten)]
  pub extra:  BTreeMap<String, serde_json::Value>,
}

/// A validated [`ResidentInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidResident {
  pub person:         Person,
  pub family_head_id: Option<String>,
}

impl ResidentInput {
  pub fn validate(self) -> Result<ValidResident> {
    let mut errors = Vec::new();
    reject_unknown(&self.extra, &mut errors);
    let person = self.person.validate(&mut errors);
    match person {
      Some(person) if errors.is_empty() => Ok(ValidResident {
        person,
        family_head_id: non_blank(self.family_head_id),
      }),
      _ => Err(Error::Validation(errors)),
    }
  }
}

impl FamilyHeadInput {
  pub fn validate(self) -> Result<Person> {
    let mut errors = Vec::new();
    reject_unknown(&self.extra, &mut errors);
    let person = self.person.validate(&mut errors);
    match person {
      Some(person) if errors.is_empty() => Ok(person),
      _ => Err(Error::Validation(errors)),
    }
  }
}

impl PersonInput {
  /// Validate every field, pushing one [`FieldError`] per problem.
  /// Returns `None` if anything was rejected.
  fn validate(self, errors: &mut Vec<FieldError>) -> Option<Person> {
    let first_name = required(errors, "firstName", "First name is required", self.first_name);
    let last_name  = required(errors, "lastName", "Last name is required", self.last_name);
    let gender     = required(errors, "gender", "Gender is required", self.gender);
    let birth_date = self.birth_date.as_deref().and_then(parse_birth_date);
    if birth_date.is_none() {
      errors.push(FieldError::new("birthDate", "Valid birth date is required"));
    }
    let address = required(errors, "address", "Address is required", self.address);

    Some(Person {
      first_name: first_name?,
      last_name: last_name?,
      gender: gender?,
      birth_date: birth_date?,
      address: address?,
      contact_number: non_blank(self.contact_number),
    })
  }
}

fn required(
  errors: &mut Vec<FieldError>,
  field: &'static str,
  message: &'static str,
  value: Option<String>,
) -> Option<String> {
  let value = non_blank(value);
  if value.is_none() {
    errors.push(FieldError::new(field, message));
  }
  value
}

fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

fn reject_unknown(
  extra: &BTreeMap<String, serde_json::Value>,
  errors: &mut Vec<FieldError>,
) {
  for key in extra.keys() {
    if !IMMUTABLE_FIELDS.contains(&key.as_str()) {
      errors.push(FieldError::new(key.clone(), "Unknown field"));
    }
  }
}

/// Parse a calendar date in `YYYY-MM-DD` or `YYYY/MM/DD` form.
pub fn parse_birth_date(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
    .ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn input(json: serde_json::Value) -> ResidentInput {
    serde_json::from_value(json).unwrap()
  }

  #[test]
  fn complete_resident_input_validates() {
    let valid = input(serde_json::json!({
      "firstName": "Maria",
      "lastName": "Santos",
      "gender": "Female",
      "birthDate": "1995-06-15",
      "address": "45 Rizal Ave",
      "familyHeadId": "F-2024001",
    }))
    .validate()
    .unwrap();

    assert_eq!(valid.person.full_name(), "Maria Santos");
    assert_eq!(valid.person.birth_date, NaiveDate::from_ymd_opt(1995, 6, 15).unwrap());
    assert_eq!(valid.person.contact_number, None);
    assert_eq!(valid.family_head_id.as_deref(), Some("F-2024001"));
  }

  #[test]
  fn missing_fields_are_all_reported() {
    let err = input(serde_json::json!({ "firstName": "  " })).validate().unwrap_err();
    let Error::Validation(errors) = err else { panic!("expected validation error") };
    let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, ["firstName", "lastName", "gender", "birthDate", "address"]);
  }

  #[test]
  fn malformed_birth_date_is_rejected() {
    let err = input(serde_json::json!({
      "firstName": "A", "lastName": "B", "gender": "Male",
      "birthDate": "15-06-1995", "address": "X",
    }))
    .validate()
    .unwrap_err();
    assert!(matches!(err, Error::Validation(ref e) if e.len() == 1 && e[0].field == "birthDate"));
  }

  #[test]
  fn empty_family_head_id_means_none() {
    let valid = input(serde_json::json!({
      "firstName": "A", "lastName": "B", "gender": "Male",
      "birthDate": "2001/02/03", "address": "X", "familyHeadId": "",
    }))
    .validate()
    .unwrap();
    assert_eq!(valid.family_head_id, None);
  }

  #[test]
  fn immutable_fields_are_ignored_but_unknown_fields_rejected() {
    let ok = input(serde_json::json!({
      "id": "R-2024009", "type": "Resident", "registrationDate": "2024-01-01T00:00:00Z",
      "firstName": "A", "lastName": "B", "gender": "Male",
      "birthDate": "2001-02-03", "address": "X",
    }));
    assert!(ok.validate().is_ok());

    let bad = input(serde_json::json!({
      "firstName": "A", "lastName": "B", "gender": "Male",
      "birthDate": "2001-02-03", "address": "X", "nickname": "Jun",
    }));
    let Err(Error::Validation(errors)) = bad.validate() else { panic!("expected validation error") };
    assert_eq!(errors, vec![FieldError::new("nickname", "Unknown field")]);
  }

  #[test]
  fn family_head_input_rejects_family_head_id() {
    let fh: FamilyHeadInput = serde_json::from_value(serde_json::json!({
      "firstName": "Juan", "lastName": "Dela Cruz", "gender": "Male",
      "birthDate": "1980-01-01", "address": "123 Main St",
      "familyHeadId": "F-2024002",
    }))
    .unwrap();
    assert!(matches!(fh.validate(), Err(Error::Validation(_))));
  }

  #[test]
  fn record_type_round_trips_through_prefix_and_wire_form() {
    assert_eq!(RecordType::from_id("R-2024001"), Some(RecordType::Resident));
    assert_eq!(RecordType::from_id("F-2024001"), Some(RecordType::FamilyHead));
    assert_eq!(RecordType::from_id("X-1"), None);
    assert_eq!(RecordType::parse(RecordType::FamilyHead.as_str()), Some(RecordType::FamilyHead));
    assert_eq!(
      serde_json::to_value(RecordType::FamilyHead).unwrap(),
      serde_json::json!("Family Head"),
    );
  }
}
