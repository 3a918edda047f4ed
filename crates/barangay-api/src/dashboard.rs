//! Handlers for `/dashboard` endpoints.
//!
//! `/stats` and `/recent-registrations` report on residents only. The three
//! distribution endpoints cover residents and family heads together.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use barangay_core::{
  Error, KeyValueStore, Repository,
  clock::Clock as _,
  keys,
  record::Record,
  stats::{self, AgeBucket, DashboardStats, GenderBucket, MonthBucket, RecentRegistration},
};
use serde::Deserialize;

use crate::error::ApiError;

async fn resident_records<S: KeyValueStore>(repo: &Repository<S>) -> Result<Vec<Record>, ApiError> {
  Ok(repo.list_residents().await?.into_iter().map(Record::from).collect())
}

/// `GET /dashboard/stats`
pub async fn overview<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
) -> Result<Json<DashboardStats>, ApiError> {
  let totals = stats::total_counts(repo.store()).await?;
  let residents = resident_records(&repo).await?;
  let live_family_heads = repo
    .store()
    .keys(keys::FAMILY_HEAD_PATTERN)
    .await
    .map_err(Error::store)?
    .len();
  let as_of = repo.clock().now();
  Ok(Json(DashboardStats::compute(totals, &residents, live_family_heads, as_of)))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  /// Defaults to [`stats::DEFAULT_RECENT`].
  pub limit: Option<usize>,
}

/// `GET /dashboard/recent-registrations[?limit=<n>]`
pub async fn recent<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  params: Result<Query<RecentParams>, QueryRejection>,
) -> Result<Json<Vec<RecentRegistration>>, ApiError> {
  let Query(params) = params?;
  let residents = resident_records(&repo).await?;
  let limit = params.limit.unwrap_or(stats::DEFAULT_RECENT);
  Ok(Json(stats::recent_registrations(&residents, limit)))
}

/// `GET /dashboard/gender-distribution`
pub async fn gender<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
) -> Result<Json<Vec<GenderBucket>>, ApiError> {
  let records = repo.list_all().await?;
  Ok(Json(stats::gender_distribution(&records)))
}

/// `GET /dashboard/age-distribution`
pub async fn age<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
) -> Result<Json<Vec<AgeBucket>>, ApiError> {
  let records = repo.list_all().await?;
  Ok(Json(stats::age_distribution(&records, repo.clock().now())))
}

/// `GET /dashboard/monthly-trends`
pub async fn monthly<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
) -> Result<Json<Vec<MonthBucket>>, ApiError> {
  let records = repo.list_all().await?;
  Ok(Json(stats::monthly_trend(&records)))
}
