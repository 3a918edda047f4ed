//! HTTP tests driving [`api_router`] over an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use barangay_core::{MemoryStore, Repository, clock::FixedClock};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

fn app() -> Router {
  let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap());
  let repo = Repository::new(Arc::new(MemoryStore::new())).with_clock(clock);
  api_router(repo)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

fn juan() -> Value {
  json!({
    "firstName": "Juan",
    "lastName": "Dela Cruz",
    "gender": "Male",
    "birthDate": "1980-01-01",
    "address": "123 Main St",
    "contactNumber": "09171234567",
  })
}

fn pedro(family_head_id: &str) -> Value {
  json!({
    "firstName": "Pedro",
    "lastName": "Dela Cruz",
    "gender": "Male",
    "birthDate": "2010-06-01",
    "address": "123 Main St",
    "familyHeadId": family_head_id,
  })
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_family_head_returns_201_with_minted_id() {
  let app = app();
  let (status, body) = send(&app, "POST", "/familyHeads", Some(juan())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["id"], "F-2024001");
  assert_eq!(body["type"], "Family Head");
  assert_eq!(body["registrationDate"], "2024-03-15T10:00:00Z");
}

#[tokio::test]
async fn household_lifecycle_over_http() {
  let app = app();
  send(&app, "POST", "/familyHeads", Some(juan())).await;

  let (status, resident) = send(&app, "POST", "/residents", Some(pedro("F-2024001"))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(resident["id"], "R-2024001");
  assert_eq!(resident["type"], "Resident");

  let (status, members) = send(&app, "GET", "/familyHeads/F-2024001/members", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(members.as_array().unwrap().len(), 1);
  assert_eq!(members[0]["id"], "R-2024001");

  let (status, body) = send(&app, "DELETE", "/familyHeads/F-2024001", None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("existing members"));

  let (status, body) = send(&app, "DELETE", "/residents/R-2024001", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Resident deleted successfully");

  let (status, body) = send(&app, "DELETE", "/familyHeads/F-2024001", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Family head deleted successfully");

  let (status, body) = send(&app, "GET", "/familyHeads/F-2024001", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Family head not found");
}

#[tokio::test]
async fn validation_errors_list_every_field() {
  let app = app();
  let (status, body) = send(&app, "POST", "/residents", Some(json!({ "firstName": "Ana" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let fields: Vec<_> = body["errors"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["field"].as_str().unwrap())
    .collect();
  assert_eq!(fields, ["lastName", "gender", "birthDate", "address"]);
}

#[tokio::test]
async fn unknown_family_head_is_a_conflict() {
  let app = app();
  let (status, body) = send(&app, "POST", "/residents", Some(pedro("F-9999999"))).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());

  let (_, list) = send(&app, "GET", "/residents", None).await;
  assert_eq!(list, json!([]));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
  let app = app();
  let req = Request::builder()
    .method("POST")
    .uri("/residents")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_resident_moves_household() {
  let app = app();
  send(&app, "POST", "/familyHeads", Some(juan())).await;
  send(&app, "POST", "/familyHeads", Some(juan())).await;
  send(&app, "POST", "/residents", Some(pedro("F-2024001"))).await;

  let (status, updated) = send(&app, "PUT", "/residents/R-2024001", Some(pedro("F-2024002"))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["familyHeadId"], "F-2024002");

  let (_, old) = send(&app, "GET", "/familyHeads/F-2024001/members", None).await;
  let (_, new) = send(&app, "GET", "/familyHeads/F-2024002/members", None).await;
  assert_eq!(old, json!([]));
  assert_eq!(new[0]["id"], "R-2024001");

  // Old household is now deletable.
  let (status, _) = send(&app, "DELETE", "/familyHeads/F-2024001", None).await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn update_family_head_reports_member_updates() {
  let app = app();
  send(&app, "POST", "/familyHeads", Some(juan())).await;
  send(&app, "POST", "/residents", Some(pedro("F-2024001"))).await;

  let mut moved = juan();
  moved["address"] = json!("9 New Rd");
  let (status, body) = send(&app, "PUT", "/familyHeads/F-2024001", Some(moved)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["address"], "9 New Rd");
  assert_eq!(body["memberUpdates"], json!([{ "residentId": "R-2024001", "status": "updated" }]));

  let (_, resident) = send(&app, "GET", "/residents/R-2024001", None).await;
  assert_eq!(resident["address"], "9 New Rd");
}

#[tokio::test]
async fn missing_resident_is_404() {
  let app = app();
  let (status, body) = send(&app, "GET", "/residents/R-2024404", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Resident not found");
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_stats_reflect_records() {
  let app = app();
  send(&app, "POST", "/familyHeads", Some(juan())).await;
  send(&app, "POST", "/residents", Some(pedro("F-2024001"))).await;
  let mut ana = pedro("");
  ana["firstName"] = json!("Ana");
  ana["gender"] = json!("Female");
  send(&app, "POST", "/residents", Some(ana)).await;
  send(&app, "DELETE", "/residents/R-2024002", None).await;

  let (status, body) = send(&app, "GET", "/dashboard/stats", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["totalResidents"], 2);
  assert_eq!(body["totalFamilyHeads"], 1);
  assert_eq!(body["liveResidents"], 1);
  assert_eq!(body["liveFamilyHeads"], 1);
  assert_eq!(body["genderData"], json!([{ "name": "Male", "value": 1, "color": "#0088FE" }]));
  assert_eq!(body["monthlyRegistrations"][2], json!({ "name": "Mar", "newResidents": 1 }));
  assert_eq!(body["recentRegistrations"][0]["name"], "Pedro Dela Cruz");
}

#[tokio::test]
async fn distributions_include_family_heads() {
  let app = app();
  send(&app, "POST", "/familyHeads", Some(juan())).await;
  send(&app, "POST", "/residents", Some(pedro("F-2024001"))).await;

  let (_, gender) = send(&app, "GET", "/dashboard/gender-distribution", None).await;
  assert_eq!(gender, json!([{ "name": "Male", "value": 2, "color": "#0088FE" }]));

  let (_, age) = send(&app, "GET", "/dashboard/age-distribution", None).await;
  let age = age.as_array().unwrap();
  assert_eq!(age.len(), 7);
  assert_eq!(age[1], json!({ "name": "11-20", "count": 1 }));
  assert_eq!(age[4], json!({ "name": "41-50", "count": 1 }));

  let (_, monthly) = send(&app, "GET", "/dashboard/monthly-trends", None).await;
  assert_eq!(monthly.as_array().unwrap().len(), 12);
  assert_eq!(monthly[2]["newResidents"], 2);
}

#[tokio::test]
async fn recent_registrations_honours_limit() {
  let app = app();
  for _ in 0..7 {
    send(&app, "POST", "/residents", Some(pedro(""))).await;
  }

  let (_, default) = send(&app, "GET", "/dashboard/recent-registrations", None).await;
  assert_eq!(default.as_array().unwrap().len(), 5);
  // Same timestamp everywhere, so the highest id comes first.
  assert_eq!(default[0]["id"], "R-2024007");

  let (_, two) = send(&app, "GET", "/dashboard/recent-registrations?limit=2", None).await;
  assert_eq!(two.as_array().unwrap().len(), 2);

  let (status, _) = send(&app, "GET", "/dashboard/recent-registrations?limit=many", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}
