use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use academic_portal::api::{StaffFilter, StudentFilter};
use academic_portal::directory::{DirectoryController, Phase};
use academic_portal::models::{EntityKind, Role};
use academic_portal::portal::Portal;
use academic_portal::resource::LoadState;
use academic_portal::{ApiClient, ApiError, Config, SessionStore};
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

const TOKEN: &str = "tok-123";
const BROKEN_TOKEN: &str = "tok-no-profile";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer {TOKEN}").as_str())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Could not validate credentials"})),
    )
        .into_response()
}

fn student_json(name: &str, department: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "user_id": Uuid::new_v4(),
        "name": name,
        "roll_number": "CSE24001",
        "department": department,
        "year": 2,
        "dob": "2005-08-14",
        "blood_group": "O+",
        "parent_phone": "9876543210",
        "personal_phone": "9876543211",
        "personal_email": "asha@example.com",
        "previous_school": null,
        "current_cgpa": 8.4,
        "academic_dna_score": 72.0,
        "growth_index": 1.5,
        "risk_level": "Low",
        "career_readiness_score": 64.0
    })
}

fn staff_json(id: Uuid, name: &str, department: &str) -> Value {
    json!({
        "id": id,
        "user_id": Uuid::new_v4(),
        "staff_id": "STF-07",
        "name": name,
        "department": department,
        "designation": "Professor",
        "be_degree": "BE ECE",
        "be_college": null,
        "me_degree": null,
        "me_college": null,
        "primary_skill": "VLSI",
        "projects_completed": 6,
        "publications_count": 3,
        "consistency_score": 0.8,
        "student_feedback_rating": 4.2,
        "personal_email": "meera@example.com",
        "personal_phone": "9876500000"
    })
}

async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
    match form.get("password").map(String::as_str) {
        Some("secret") => {
            Json(json!({"access_token": TOKEN, "token_type": "bearer"})).into_response()
        }
        Some("no-profile") => {
            Json(json!({"access_token": BROKEN_TOKEN, "token_type": "bearer"})).into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect username or password"})),
        )
            .into_response(),
    }
}

async fn me(headers: HeaderMap) -> Response {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());
    if bearer == Some(format!("Bearer {BROKEN_TOKEN}").as_str()) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Profile lookup failed"})),
        )
            .into_response();
    }
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "email": "admin@college.edu",
        "role": "admin",
        "full_name": "Portal Admin",
        "institutional_email": null
    }))
    .into_response()
}

async fn students(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let search = query.get("search").cloned().unwrap_or_default();
    if search == "forbidden" {
        return Json(json!({"error": "Unauthorized"})).into_response();
    }
    let department = query.get("department").cloned().unwrap_or_else(|| "ECE".to_string());
    let name = if search.is_empty() { "Everyone" } else { search.as_str() };
    Json(json!([student_json(name, &department)])).into_response()
}

async fn delete_student(headers: HeaderMap, Path(id): Path<Uuid>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id.is_nil() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Student has pending records"})),
        )
            .into_response();
    }
    Json(json!({"message": "Student deleted"})).into_response()
}

async fn staff(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if query
        .keys()
        .any(|key| key != "search" && key != "department")
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Unknown staff filter"})),
        )
            .into_response();
    }
    let name = query.get("search").map_or("Everyone", String::as_str);
    let department = query.get("department").map_or("ALL", String::as_str);
    Json(json!([staff_json(Uuid::new_v4(), name, department)])).into_response()
}

fn staff_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": "Staff not found"})),
    )
        .into_response()
}

async fn staff_detail(headers: HeaderMap, Path(id): Path<Uuid>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id.is_nil() {
        return staff_not_found();
    }
    let mut body = staff_json(id, "Meera Iyer", "ECE");
    body["user"] = json!({
        "email": "meera@college.edu",
        "role": "faculty",
        "full_name": "Meera Iyer",
        "institutional_email": "meeraece777@gmail.com"
    });
    Json(body).into_response()
}

async fn delete_staff(headers: HeaderMap, Path(id): Path<Uuid>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if id.is_nil() {
        return staff_not_found();
    }
    Json(json!({"message": "Staff deleted"})).into_response()
}

async fn overview(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({})).into_response()
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/auth/token", post(token))
        .route("/users/me", get(me))
        .route("/admin/students", get(students))
        .route("/admin/students/:id", delete(delete_student))
        .route("/admin/staff", get(staff))
        .route("/admin/staff/:id", get(staff_detail).delete(delete_staff))
        .route("/admin/overview", get(overview));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn client(addr: SocketAddr) -> ApiClient {
    let config = Config {
        api_url: format!("http://{addr}/"),
        timeout_secs: 5,
        ..Config::default()
    };
    ApiClient::new(&config, Arc::new(SessionStore::in_memory())).expect("client")
}

async fn logged_in(addr: SocketAddr) -> ApiClient {
    let api = client(addr);
    api.login("admin@college.edu", "secret").await.expect("login");
    api
}

#[tokio::test]
async fn login_resolves_role_and_authorizes_later_calls() {
    let addr = spawn_server().await;
    let api = client(addr);

    let session = api.login("admin@college.edu", "secret").await.expect("login");
    assert_eq!(session.role, Role::Admin);
    assert_eq!(api.session().current(), Some(session));

    let filter = StudentFilter {
        search: Some("Asha".to_string()),
        department: Some("CSE".to_string()),
        year: None,
    };
    let students = api.list_students(&filter).await.expect("students");
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].name.as_deref(), Some("Asha"));
    assert_eq!(students[0].department.as_deref(), Some("CSE"));
}

#[tokio::test]
async fn wrong_password_keeps_server_detail_and_no_session() {
    let addr = spawn_server().await;
    let api = client(addr);

    let err = api
        .login("admin@college.edu", "nope")
        .await
        .expect_err("should fail");
    assert_eq!(err.user_message(), "Incorrect username or password");
    assert!(err.is_auth_failure());
    assert!(api.session().current().is_none());
}

#[tokio::test]
async fn login_fails_closed_when_profile_lookup_fails() {
    let addr = spawn_server().await;
    let api = client(addr);

    let err = api
        .login("admin@college.edu", "no-profile")
        .await
        .expect_err("should fail");
    assert!(matches!(err, ApiError::Status { status: 500, .. }));
    assert_eq!(err.user_message(), "Profile lookup failed");
    assert!(api.session().current().is_none());

    let err = api
        .list_students(&StudentFilter::default())
        .await
        .expect_err("should fail");
    assert!(matches!(err, ApiError::Unauthenticated));
}

#[tokio::test]
async fn calls_without_session_fail_before_the_network() {
    let addr = spawn_server().await;
    let api = client(addr);
    let err = api
        .list_students(&StudentFilter::default())
        .await
        .expect_err("should fail");
    assert!(matches!(err, ApiError::Unauthenticated));
}

#[tokio::test]
async fn error_envelope_is_a_rejection() {
    let addr = spawn_server().await;
    let api = logged_in(addr).await;
    let err = api
        .list_students(&StudentFilter::search("forbidden"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, ApiError::Rejected(ref m) if m == "Unauthorized"));
}

#[tokio::test]
async fn delete_failure_surfaces_detail() {
    let addr = spawn_server().await;
    let api = logged_in(addr).await;

    let ok = api.delete_student(Uuid::new_v4()).await.expect("delete");
    assert_eq!(ok.message, "Student deleted");

    let err = api.delete_student(Uuid::nil()).await.expect_err("should fail");
    assert_eq!(err.user_message(), "Student has pending records");
}

#[tokio::test]
async fn empty_overview_means_no_data() {
    let addr = spawn_server().await;
    let api = logged_in(addr).await;
    assert_eq!(api.overview().await.expect("overview"), None);
}

#[tokio::test]
async fn directory_searches_through_the_client() {
    let addr = spawn_server().await;
    let api = Arc::new(logged_in(addr).await);
    let controller =
        DirectoryController::new(Arc::clone(&api), EntityKind::Student, Duration::from_millis(20));
    let mut updates = controller.subscribe();

    controller.set_query("Ravi");
    let view = tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|view| view.phase == Phase::Idle && !view.entries.is_empty()),
    )
    .await
    .expect("search finished in time")
    .expect("controller alive")
    .clone();

    assert_eq!(view.entries.len(), 1);
    assert_eq!(view.entries[0].display_name(), "Ravi");
    assert!(view.notice.is_none());
}

#[tokio::test]
async fn portal_caches_overview_until_a_delete() {
    let addr = spawn_server().await;
    let portal = Portal::new(Arc::new(logged_in(addr).await));
    assert_eq!(portal.overview_state(), LoadState::Idle);

    let first = portal.overview().await.expect("overview");
    let second = portal.overview().await.expect("cached overview");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(matches!(portal.overview_state(), LoadState::Ready(_)));

    portal
        .delete(EntityKind::Student, Uuid::new_v4())
        .await
        .expect("delete");
    assert_eq!(portal.overview_state(), LoadState::Idle);
}

#[tokio::test]
async fn staff_list_sends_only_filled_filters() {
    let addr = spawn_server().await;
    let api = logged_in(addr).await;

    let filter = StaffFilter {
        search: Some("Meera".to_string()),
        department: Some("ECE".to_string()),
    };
    let staff = api.list_staff(&filter).await.expect("staff");
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[0].name.as_deref(), Some("Meera"));
    assert_eq!(staff[0].department.as_deref(), Some("ECE"));

    let blank = StaffFilter {
        search: Some("  ".to_string()),
        department: None,
    };
    let staff = api.list_staff(&blank).await.expect("staff");
    assert_eq!(staff[0].name.as_deref(), Some("Everyone"));
    assert_eq!(staff[0].department.as_deref(), Some("ALL"));
}

#[tokio::test]
async fn staff_detail_and_delete_round_trip() {
    let addr = spawn_server().await;
    let portal = Portal::new(Arc::new(logged_in(addr).await));
    let id = Uuid::new_v4();

    let detail = portal.staff(id).await.expect("detail");
    assert_eq!(detail.staff.id, id);
    assert_eq!(detail.staff.projects_completed, 6);
    assert_eq!(detail.user.role, Role::Faculty);
    assert_eq!(
        detail.user.institutional_email.as_deref(),
        Some("meeraece777@gmail.com")
    );

    let missing = portal
        .api()
        .staff_detail(Uuid::nil())
        .await
        .expect_err("should fail");
    assert_eq!(missing.user_message(), "Staff not found");

    let deleted = portal.delete(EntityKind::Staff, id).await.expect("delete");
    assert_eq!(deleted.message, "Staff deleted");
    assert_eq!(portal.staff_state(id), LoadState::Idle);

    let err = portal
        .delete(EntityKind::Staff, Uuid::nil())
        .await
        .expect_err("should fail");
    assert_eq!(err.user_message(), "Staff not found");
}
