//! Encoding and decoding between typed records and the flat string field maps
//! stored under `resident:<id>` / `familyHead:<id>`.
//!
//! Field names are the camelCase wire names. Absent optional values are stored
//! as the empty string. `registrationDate` is RFC 3339 in UTC with millisecond
//! precision; `birthDate` is `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::{
  Error, Result,
  kv::FieldMap,
  record::{FamilyHead, Person, RecordType, Resident},
};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

// ─── Records ─────────────────────────────────────────────────────────────────

pub fn encode_resident(r: &Resident) -> FieldMap {
  let mut fields = encode_person(&r.id, &r.person, r.registration_date, RecordType::Resident);
  fields.insert(
    "familyHeadId".to_owned(),
    r.family_head_id.clone().unwrap_or_default(),
  );
  fields
}

pub fn encode_family_head(f: &FamilyHead) -> FieldMap {
  encode_person(&f.id, &f.person, f.registration_date, RecordType::FamilyHead)
}

fn encode_person(
  id: &str,
  p: &Person,
  registered: DateTime<Utc>,
  kind: RecordType,
) -> FieldMap {
  [
    ("id", id.to_owned()),
    ("firstName", p.first_name.clone()),
    ("lastName", p.last_name.clone()),
    ("gender", p.gender.clone()),
    ("birthDate", p.birth_date.format("%Y-%m-%d").to_string()),
    ("address", p.address.clone()),
    ("contactNumber", p.contact_number.clone().unwrap_or_default()),
    ("registrationDate", encode_dt(registered)),
    ("type", kind.as_str().to_owned()),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_owned(), v))
  .collect()
}

/// Decode the hash stored at `key`.
pub fn decode_resident(key: &str, fields: &FieldMap) -> Result<Resident> {
  let raw = RawFields { key, fields };
  raw.expect_type(RecordType::Resident)?;
  Ok(Resident {
    id:                raw.required("id")?.to_owned(),
    person:            raw.person()?,
    family_head_id:    raw.optional("familyHeadId"),
    registration_date: raw.registration_date()?,
    record_type:       RecordType::Resident,
  })
}

/// Decode the hash stored at `key`.
pub fn decode_family_head(key: &str, fields: &FieldMap) -> Result<FamilyHead> {
  let raw = RawFields { key, fields };
  raw.expect_type(RecordType::FamilyHead)?;
  Ok(FamilyHead {
    id:                raw.required("id")?.to_owned(),
    person:            raw.person()?,
    registration_date: raw.registration_date()?,
    record_type:       RecordType::FamilyHead,
  })
}

// ─── Field access ────────────────────────────────────────────────────────────

struct RawFields<'a> {
  key:    &'a str,
  fields: &'a FieldMap,
}

impl RawFields<'_> {
  fn corrupt(&self, reason: impl Into<String>) -> Error {
    Error::Corrupt { key: self.key.to_owned(), reason: reason.into() }
  }

  fn required(&self, field: &str) -> Result<&str> {
    self
      .fields
      .get(field)
      .map(String::as_str)
      .filter(|v| !v.is_empty())
      .ok_or_else(|| self.corrupt(format!("missing field {field:?}")))
  }

  fn optional(&self, field: &str) -> Option<String> {
    self.fields.get(field).filter(|v| !v.is_empty()).cloned()
  }

  /// Records written before `type` was stored are accepted as the expected
  /// type; a present but different type is corruption.
  fn expect_type(&self, expected: RecordType) -> Result<()> {
    match self.fields.get("type").map(String::as_str) {
      None | Some("") => Ok(()),
      Some(t) if RecordType::parse(t) == Some(expected) => Ok(()),
      Some(t) => Err(self.corrupt(format!("unexpected type {t:?}"))),
    }
  }

  fn person(&self) -> Result<Person> {
    let birth = self.required("birthDate")?;
    let birth_date = NaiveDate::parse_from_str(birth, "%Y-%m-%d")
      .map_err(|e| self.corrupt(format!("birthDate {birth:?}: {e}")))?;
    Ok(Person {
      first_name: self.required("firstName")?.to_owned(),
      last_name: self.required("lastName")?.to_owned(),
      gender: self.optional("gender").unwrap_or_default(),
      birth_date,
      address: self.optional("address").unwrap_or_default(),
      contact_number: self.optional("contactNumber"),
    })
  }

  fn registration_date(&self) -> Result<DateTime<Utc>> {
    let s = self.required("registrationDate")?;
    decode_dt(s).ok_or_else(|| self.corrupt(format!("registrationDate {s:?}")))
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn resident() -> Resident {
    Resident {
      id:                "R-2024001".into(),
      person:            Person {
        first_name:     "Maria".into(),
        last_name:      "Santos".into(),
        gender:         "Female".into(),
        birth_date:     NaiveDate::from_ymd_opt(1995, 6, 15).unwrap(),
        address:        "45 Rizal Ave".into(),
        contact_number: None,
      },
      family_head_id:    Some("F-2024001".into()),
      registration_date: Utc.with_ymd_and_hms(2024, 3, 5, 8, 30, 0).unwrap(),
      record_type:       RecordType::Resident,
    }
  }

  #[test]
  fn resident_fields_use_store_layout() {
    let fields = encode_resident(&resident());
    assert_eq!(fields["familyHeadId"], "F-2024001");
    assert_eq!(fields["contactNumber"], "");
    assert_eq!(fields["registrationDate"], "2024-03-05T08:30:00.000Z");
    assert_eq!(fields["type"], "Resident");
    assert_eq!(fields.len(), 10);
  }

  #[test]
  fn decode_inverts_encode() {
    let r = resident();
    let decoded = decode_resident("resident:R-2024001", &encode_resident(&r)).unwrap();
    assert_eq!(decoded, r);
  }

  #[test]
  fn decoding_a_family_head_hash_as_resident_is_corrupt() {
    let mut fields = encode_resident(&resident());
    fields.insert("type".into(), "Family Head".into());
    let err = decode_resident("resident:R-2024001", &fields).unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }));
  }

  #[test]
  fn missing_required_field_is_corrupt() {
    let mut fields = encode_resident(&resident());
    fields.remove("birthDate");
    assert!(matches!(
      decode_resident("resident:R-2024001", &fields),
      Err(Error::Corrupt { ref reason, .. }) if reason.contains("birthDate"),
    ));
  }
}
