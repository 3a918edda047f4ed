//! JSON REST API for barangay records.
//!
//! Exposes an axum [`Router`] backed by a [`Repository`] over any
//! [`KeyValueStore`]. Authentication and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", barangay_api::api_router(repo.clone()))
//! ```

pub mod dashboard;
pub mod error;
pub mod family_heads;
pub mod residents;

use axum::{Router, routing::get};
use barangay_core::{KeyValueStore, Repository};

pub use error::ApiError;

/// Build a fully-materialised API router for `repo`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(repo: Repository<S>) -> Router<()>
where
  S: KeyValueStore + 'static,
{
  Router::new()
    // Residents
    .route("/residents", get(residents::list::<S>).post(residents::create::<S>))
    .route(
      "/residents/{id}",
      get(residents::get_one::<S>)
        .put(residents::update::<S>)
        .delete(residents::delete::<S>),
    )
    // Family heads
    .route(
      "/familyHeads",
      get(family_heads::list::<S>).post(family_heads::create::<S>),
    )
    .route(
      "/familyHeads/{id}",
      get(family_heads::get_one::<S>)
        .put(family_heads::update::<S>)
        .delete(family_heads::delete::<S>),
    )
    .route("/familyHeads/{id}/members", get(family_heads::members::<S>))
    // Dashboard
    .route("/dashboard/stats", get(dashboard::overview::<S>))
    .route("/dashboard/recent-registrations", get(dashboard::recent::<S>))
    .route("/dashboard/gender-distribution", get(dashboard::gender::<S>))
    .route("/dashboard/age-distribution", get(dashboard::age::<S>))
    .route("/dashboard/monthly-trends", get(dashboard::monthly::<S>))
    .with_state(repo)
}

#[cfg(test)]
mod tests;
