//! Store key layout.
//!
//! | Key | Type | Holds |
//! |-----|------|-------|
//! | `resident:<id>` | hash | a [`Resident`](crate::record::Resident) |
//! | `familyHead:<id>` | hash | a [`FamilyHead`](crate::record::FamilyHead) |
//! | `familyMembers:<familyHeadId>` | set | resident ids |
//! | `residents:count` | string | resident sequence counter |
//! | `familyHeads:count` | string | family head sequence counter |
//! | `user:<username>` | hash | a staff account |

pub const RESIDENT_COUNTER: &str = "residents:count";
pub const FAMILY_HEAD_COUNTER: &str = "familyHeads:count";

pub const RESIDENT_PATTERN: &str = "resident:*";
pub const FAMILY_HEAD_PATTERN: &str = "familyHead:*";

pub fn resident(id: &str) -> String { format!("resident:{id}") }

pub fn family_head(id: &str) -> String { format!("familyHead:{id}") }

pub fn family_members(family_head_id: &str) -> String {
  format!("familyMembers:{family_head_id}")
}

pub fn user(username: &str) -> String { format!("user:{username}") }
