//! Core types and logic for the barangay records service.
//!
//! This crate has no HTTP or database dependencies. It owns
//! the typed records, the [`KeyValueStore`](kv::KeyValueStore) abstraction
//! they are persisted through, and the three pieces with real invariants:
//! identifier minting ([`id`]), the family-head membership index
//! ([`membership`]), and the [`Repository`](repository::Repository) that keeps
//! both consistent with the records. Dashboard aggregation lives in [`stats`].

// Futures on `KeyValueStore` carry explicit `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod encode;
pub mod error;
pub mod id;
pub mod keys;
pub mod kv;
pub mod membership;
pub mod memory;
pub mod record;
pub mod repository;
pub mod stats;

pub use error::{Error, FieldError, Result};
pub use kv::{FieldMap, KeyValueStore};
pub use memory::MemoryStore;
pub use repository::Repository;
